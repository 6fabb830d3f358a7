fn main() {
    if let Err(err) = adhush_lib::run() {
        eprintln!("adhush: {err:#}");
        std::process::exit(1);
    }
}
