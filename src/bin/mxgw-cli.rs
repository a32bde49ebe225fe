use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use mx_gateway::codec::CodecPipeline;
use mx_gateway::config::schema::{CodecConfig, CompressionConfig, CryptoAlgorithm, CryptoConfig};
use mx_gateway::protocol::descriptor::{hash_alias, path_alias};

#[derive(Parser)]
#[command(name = "mxgw-cli")]
#[command(about = "Offline tools and health checks for the mx.dat gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the path and hash alias of a protocol name
    Alias { name: String },
    /// Encode a JSON file into a base64 mx.dat blob
    Encode {
        /// Base64 32-byte key; omit for no encryption
        #[arg(short, long)]
        key: Option<String>,
        #[arg(short, long, value_enum, default_value_t = Algorithm::MxData)]
        algorithm: Algorithm,
        /// Deflate before encrypting
        #[arg(short, long)]
        compress: bool,
        json_file: PathBuf,
    },
    /// Decode a blob file (base64 text or raw bytes) and print the JSON
    Decode {
        #[arg(short, long)]
        key: Option<String>,
        blob_file: PathBuf,
    },
    /// Query a running gateway's health endpoint
    Health {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    Aes256Gcm,
    Chacha20Poly1305,
    MxData,
}

impl From<Algorithm> for CryptoAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Aes256Gcm => CryptoAlgorithm::Aes256Gcm,
            Algorithm::Chacha20Poly1305 => CryptoAlgorithm::ChaCha20Poly1305,
            Algorithm::MxData => CryptoAlgorithm::MxData,
        }
    }
}

fn pipeline(key: Option<String>, algorithm: Algorithm, compress: bool) -> Result<CodecPipeline, Box<dyn std::error::Error>> {
    let config = CodecConfig {
        crypto: CryptoConfig {
            enabled: key.is_some(),
            algorithm: algorithm.into(),
            key,
        },
        compression: CompressionConfig { enabled: compress },
    };
    Ok(CodecPipeline::from_config(&config)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Alias { name } => {
            println!("path: {}", path_alias(&name));
            println!("hash: {}", hash_alias(&name));
        }
        Commands::Encode {
            key,
            algorithm,
            compress,
            json_file,
        } => {
            let text = std::fs::read_to_string(&json_file)?;
            serde_json::from_str::<Value>(&text)?;
            let encoded = pipeline(key, algorithm, compress)?.encode(text.trim())?;
            println!("{}", BASE64.encode(&encoded.bytes));
        }
        Commands::Decode { key, blob_file } => {
            let raw = std::fs::read(&blob_file)?;
            let text: String = String::from_utf8_lossy(&raw)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let blob = BASE64.decode(&text).unwrap_or(raw);

            let (json, trace) = pipeline(key, Algorithm::MxData, true)?.decode(&blob)?;
            println!("{}", trace);
            let value: Value = serde_json::from_str(&json)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Health { url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/health", url.trim_end_matches('/')))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
