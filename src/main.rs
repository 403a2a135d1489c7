fn main() {
    if let Err(err) = cloud_audit::cli::run() {
        cloud_audit::ui::eprintln_error(&err);
        std::process::exit(cloud_audit::exit::exit_code(&err));
    }
}
