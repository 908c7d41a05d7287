use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let matches = itpl::cli().get_matches();

    let default_filter = match matches.get_count("verbose") {
        0 => "itpl=warn",
        1 => "itpl=debug",
        _ => "itpl=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    itpl::run(&matches)
}
