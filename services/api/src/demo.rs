use crate::cli::ScoreArgs;
use crate::infra::{build_score_service, demo_app_config};
use crediscore::bureau::domain::Provider;
use crediscore::bureau::service::ScoreOptions;
use crediscore::error::AppError;

/// One-shot scoring against the demo transport, printed as pretty JSON.
pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let service = build_score_service(&demo_app_config());
    let options = ScoreOptions {
        provider: args.provider,
        force_refresh: args.force_refresh,
        sandbox: args.sandbox.then_some(true),
        timeout_ms: None,
        debug: false,
    };

    let rendered = if args.legacy {
        let legacy = service.score_final(&args.documento, options).await;
        serde_json::to_string_pretty(&legacy)
    } else {
        let result = service.calculate_score(&args.documento, options).await;
        serde_json::to_string_pretty(&result)
    }
    .map_err(|err| AppError::Io(std::io::Error::other(err)))?;

    println!("{rendered}");
    Ok(())
}

/// Walk every provider through the pipeline, including a deceased rejection,
/// printing modern and legacy payloads side by side.
pub(crate) async fn run_demo() -> Result<(), AppError> {
    let service = build_score_service(&demo_app_config());

    let samples = [
        ("48237651", Provider::Equifax, "clean Equifax report"),
        ("51873220", Provider::Bcu, "direct BCU lookup"),
        ("39914785", Provider::Mym, "aggregator with two periods"),
        ("41002399", Provider::Equifax, "deceased holder, rejected"),
    ];

    for (documento, provider, label) in samples {
        let options = ScoreOptions {
            provider,
            ..ScoreOptions::default()
        };
        let result = service.calculate_score(documento, options).await;

        println!("=== {label} ({documento} via {provider}) ===");
        println!(
            "{}",
            serde_json::to_string_pretty(&result)
                .map_err(|err| AppError::Io(std::io::Error::other(err)))?
        );

        let legacy = service.score_final(documento, options).await;
        println!("--- legacy contract ---");
        println!(
            "{}",
            serde_json::to_string_pretty(&legacy)
                .map_err(|err| AppError::Io(std::io::Error::other(err)))?
        );
        println!();
    }

    Ok(())
}
