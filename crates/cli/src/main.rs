fn main() {
    if let Err(error) = pdf_annotate::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
