fn main() {
    photo_gallery_cli::init_tracing();

    if let Err(error) = photo_gallery_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
