//! sign-url: mint a signed URL for the image store.
//!
//! Uses the same secret as the server (`--secret` or `SECRET_KEY`).

use clap::{Parser, ValueEnum};
use std::process;

use signed_store::auth::UrlSigner;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Parser)]
#[command(name = "sign-url", about = "Print a signed URL for the image store")]
struct Cli {
    /// HTTP method the URL is valid for
    #[arg(long, value_enum, ignore_case = true)]
    method: Method,
    /// Object name; omit for uploads
    #[arg(long)]
    filename: Option<String>,
    /// Validity in seconds from now
    #[arg(long, default_value_t = 3600)]
    duration: i64,
    /// Server base URL
    #[arg(long, default_value = "http://localhost:8000")]
    base_url: String,
    /// Shared secret
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    secret: String,
}

fn main() {
    let cli = Cli::parse();

    let signer = match UrlSigner::new(&cli.secret) {
        Ok(signer) => signer,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let filename = match (cli.method, cli.filename.as_deref()) {
        (Method::Post, _) => "",
        (_, Some(name)) if !name.is_empty() => name,
        (_, _) => {
            eprintln!("error: --filename is required for {}", cli.method.as_str());
            process::exit(2);
        }
    };

    let expires = chrono::Utc::now().timestamp() + cli.duration;
    println!(
        "{}",
        signer.signed_url(&cli.base_url, cli.method.as_str(), filename, expires)
    );
}
