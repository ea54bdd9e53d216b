fn main() {
    if let Err(err) = nrc_tracker::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
