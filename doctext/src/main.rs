use doctext::{Config, Doc};
use tracing_subscriber::prelude::*;

fn usage(me: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("{} <docfile>", me);
    std::process::exit(2);
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        usage(args.first().map(|s| s.as_str()).unwrap_or("doctext"));
    }

    let config = Config::new().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });
    let doc = Doc::open_with_config(&args[1], &config).unwrap_or_else(|e| {
        eprintln!("Failed to open {}: {}", args[1], e);
        std::process::exit(1);
    });
    if !doc.is_valid_word_doc() {
        eprintln!("{} is not a Word document", args[1]);
        std::process::exit(1);
    }
    match doc.get_text() {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Failed to extract the text of {}: {}", args[1], e);
            std::process::exit(1);
        }
    }
    doc.close();
}
