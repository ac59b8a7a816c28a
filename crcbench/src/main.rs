fn main() {
    if let Err(e) = crcbench::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
