pub fn run() {
    println!("repoman version: {}", env!("CARGO_PKG_VERSION"));
}
