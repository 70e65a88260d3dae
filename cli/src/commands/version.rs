//! Version command

/// Run the version command.
pub fn run() {
    println!("sal-submit {}", env!("CARGO_PKG_VERSION"));
}
