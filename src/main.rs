use fir_updater::cli;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let code = match cli::parse_args(&args) {
        Ok(parsed) => cli::run(parsed),
        Err(e) => {
            eprintln!("✗ {}", e);
            eprintln!("  Run 'fir-updater --cli help' for usage.");
            1
        }
    };

    std::process::exit(code);
}
