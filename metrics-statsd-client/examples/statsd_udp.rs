use std::{thread::sleep, time::Duration};

use metrics_statsd_client::StatsdBuilder;

fn main() {
    tracing_subscriber::fmt::init();

    let mut metrics = StatsdBuilder::default()
        .with_remote_address("localhost:8125")
        .expect("failed to parse remote address")
        .with_namespace("statsd_udp")
        .build()
        .expect("failed to build statsd client");

    metrics.gauge("startup", 1);

    // Loop over and over, pretending to do some work.
    let mut iterations: u64 = 0;
    loop {
        iterations += 1;
        metrics.increment_one("loops");
        metrics.gauge("iterations", iterations);

        // Measures the time since the previous pass through the loop.
        metrics.timing("loop_delta", None);

        if iterations % 10 == 0 {
            metrics.report("phase", "steady", "s");
        }

        sleep(Duration::from_millis(100));
    }
}
