fn main() {
    smartpdf_cli::init_tracing();

    if let Err(error) = smartpdf_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
