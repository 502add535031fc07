fn main() {
    if let Err(err) = tasktrail_lib::run() {
        eprintln!("tasktrail: {err:#}");
        std::process::exit(1);
    }
}
