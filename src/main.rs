use registry_lister::cli::{Args, Runner};
use registry_lister::logging::init_tracing;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    init_tracing(&args.log);

    let result = match Runner::new(args) {
        Ok(runner) => runner.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
