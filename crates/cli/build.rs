use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("chumon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scrape product pages into an order workbook")
        .arg(clap::arg!([QUERY] ... "Product URL with optional quantity"))
        .arg(clap::arg!(-i --input <FILE> "File with one query per line, or '-' for stdin").value_name("FILE"))
        .arg(
            clap::arg!(-o --output <FILE> "Workbook to write (required unless --dry-run)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--append "Add rows to an existing workbook instead of replacing it"))
        .arg(clap::arg!(--sheet <NAME> "Sheet to write to").value_name("NAME"))
        .arg(
            clap::arg!(--policy <POLICY> "What to do when a query fails")
                .value_name("POLICY")
                .value_parser(["fail-fast", "collect-all"]),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds"))
        .arg(clap::arg!(--retries <NUM> "Attempts per page, including the first"))
        .arg(clap::arg!(--tax_rate <RATE> "Consumption tax rate as a fraction, e.g. 0.10"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests").value_name("UA"))
        .arg(
            clap::arg!(--config <FILE> "Settings file")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--no_delay "Do not pause between requests to the same shop"))
        .arg(
            clap::arg!(--page <FILE> "Serve this saved HTML page for every query instead of fetching")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--dry_run "Print records without writing a workbook"))
        .arg(
            clap::arg!(-f --format <FORMAT> "Record listing format (text, json)")
                .value_name("FORMAT")
                .default_value("text")
                .value_parser(["text", "json"]),
        )
        .arg(clap::arg!(--write_attempts <NUM> "Attempts to write a locked workbook").default_value("1"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"))
        .arg(
            clap::arg!(--completions <SHELL> "Generate shell completion script")
                .value_name("SHELL")
                .value_parser(["bash", "zsh", "fish", "powershell", "elvish"]),
        );

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "chumon", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "chumon", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "chumon", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "chumon", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
