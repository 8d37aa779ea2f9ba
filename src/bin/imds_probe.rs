use clap::Parser;
use sagemaker_loadtest::core::credentials::ImdsCredentialProvider;
use sagemaker_loadtest::core::CredentialProvider;
use sagemaker_loadtest::utils::error::Result;
use sagemaker_loadtest::utils::logger;

/// 確認這台 EC2 能否從 IMDSv2 取得角色憑證，不會印出密鑰
#[derive(Parser)]
#[command(name = "imds-probe")]
#[command(about = "Check that instance role credentials can be fetched from IMDSv2")]
struct Args {
    #[arg(long, env = "IMDS_ENDPOINT", default_value = "http://169.254.169.254")]
    imds_endpoint: String,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    println!("🔑 Probing IMDSv2 at {}", args.imds_endpoint);

    let provider = ImdsCredentialProvider::new(&args.imds_endpoint)?;
    let credentials = provider.fetch().await?;

    println!("✅ Credentials fetched");
    println!("  Access key: {}", credentials.access_key_id);
    println!(
        "  Session token: {}",
        if credentials.session_token.is_some() { "present" } else { "absent" }
    );
    match credentials.expiration {
        Some(expiration) => println!("  Expires: {}", expiration),
        None => println!("  Expires: unknown"),
    }

    Ok(())
}
