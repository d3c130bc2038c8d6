//! Standalone PDF text extractor.
//!
//! Runs as a subprocess of the analysis so a panic inside pdf-extract on a
//! malformed screener export only takes down this process.
//!
//! Usage: pdf_extractor <path_to_pdf>
//! Output: text of each page on stdout, pages separated by form feed (`\x0c`)
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments
//!   2 - PDF read error
//!   3 - PDF extraction error
//!   4 - PDF validation failed

use crypto_vat::futures_pdf::{validate_pdf, PAGE_SEPARATOR};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: pdf_extractor <path_to_pdf>");
        return ExitCode::from(1);
    }

    let pdf_path = &args[1];

    let bytes = match fs::read(pdf_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("READ_ERROR:{}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = validate_pdf(&bytes) {
        eprintln!("VALIDATE_ERROR:{}", e);
        return ExitCode::from(4);
    }

    match pdf_extract::extract_text_from_mem_by_pages(&bytes) {
        Ok(pages) => {
            let text = pages.join(&PAGE_SEPARATOR.to_string());
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            if let Err(e) = handle.write_all(text.as_bytes()) {
                eprintln!("WRITE_ERROR:{}", e);
                return ExitCode::from(3);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("EXTRACT_ERROR:{}", e);
            ExitCode::from(3)
        }
    }
}
