fn main() {
    if let Err(e) = ehospital_lib::run() {
        tracing::error!("{e}");
        eprintln!("ehospital: {e}");
        std::process::exit(1);
    }
}
