use std::env;
use std::time::Duration;

use comfort_autocontrol::{
    AutoController, ComfortPolicy, Iso7730, PmvStatus, Sample, SmartThingsGateway,
    TriggerOutcome, assess,
};

#[tokio::main]
async fn main() -> comfort_autocontrol::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let usage = "usage: autopilot <temperature-c> <humidity-%>";
    let temperature: f64 = args.get(1).and_then(|s| s.parse().ok()).expect(usage);
    let humidity: f64 = args.get(2).and_then(|s| s.parse().ok()).expect(usage);
    let sample = Sample::new(temperature, humidity)?;

    let report = assess(&Iso7730, sample).await?;
    println!(
        "DI {:.1} ({}) | HI {:.1}\u{00b0}C ({}) | CLI {:.1} kJ/kg | {:.2} kW",
        report.metrics.di,
        report.bands.di.label(),
        report.metrics.hi,
        report.bands.hi.label(),
        report.metrics.cli,
        report.metrics.cooling_power_kw,
    );
    if let PmvStatus::Ready { pmv, ppd, band } = report.pmv {
        println!("PMV {pmv:.2} | PPD {ppd:.1}% ({})", band.label());
    }

    let gateway = SmartThingsGateway::from_env()?;
    let controller = AutoController::builder(ComfortPolicy::default(), gateway)
        .on_event(|event| println!("{event:?}"))
        .build()?;

    match controller.on_sample(sample).await? {
        TriggerOutcome::Activated { command, .. } => {
            println!(
                "Holding {} for {}s...",
                command.state, command.duration_secs
            );
        }
        other => {
            println!("Nothing to do: {other:?}");
            return Ok(());
        }
    }

    while controller.is_locked_out() {
        tokio::time::sleep(Duration::from_secs(30)).await;
        println!("{}s remaining", controller.session().remaining_secs);
    }
    Ok(())
}
