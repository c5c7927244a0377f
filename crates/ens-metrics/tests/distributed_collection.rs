mod common;

use std::any::Any;
use std::thread;

use common::{assert_close, finalized_number_metric, number_metric};
use ens_core::{EnsembleError, ErrorInfo};
use ens_metrics::{
    ChannelTransport, EnsembleKind, EnsembleMetric, MetricTag, Resources, SummaryTransport,
};

#[test]
fn workers_send_raw_values_to_the_collector() {
    let mut mesh = ChannelTransport::mesh(3).into_iter();
    let collector_transport = mesh.next().expect("rank 0");
    let worker_transports: Vec<_> = mesh.collect();

    let handles: Vec<_> = worker_transports
        .into_iter()
        .map(|transport| {
            thread::spawn(move || {
                let rank = transport.rank() as f64;
                let mut metric = number_metric();
                metric.apply(&(rank * 10.0)).expect("apply");
                metric.apply(&(rank * 10.0 + 1.0)).expect("apply");
                assert!(metric.supports_distributed_collection());
                metric.send_summary(&transport, 0).expect("send");
                metric.reset();
            })
        })
        .collect();

    let mut collector = number_metric();
    collector.apply(&0.0).expect("apply");
    let mut sources = Vec::new();
    for _ in 0..2 {
        sources.push(collector.receive_summary(&collector_transport).expect("receive"));
    }
    for handle in handles {
        handle.join().expect("worker");
    }
    sources.sort_unstable();
    assert_eq!(sources, vec![1, 2]);
    assert_eq!(collector.items_in_ensemble(), 5);

    collector.report().expect("report");
    assert_close(collector.get_value("mean").expect("mean"), 62.0 / 5.0);
    assert_close(collector.get_value("max").expect("max"), 21.0);
}

#[test]
fn finalized_collector_refuses_packets() {
    let mesh = ChannelTransport::mesh(1);
    let mut metric = finalized_number_metric(&[1.0]);
    let err = metric.receive_summary(&mesh[0]).expect_err("finalized");
    assert!(matches!(err, EnsembleError::Precondition(_)));
}

struct Counter {
    seen: usize,
}

impl EnsembleKind<f64> for Counter {
    fn name(&self) -> &str {
        "Counter"
    }

    fn metric_names(&self) -> &'static [&'static str] {
        &["count"]
    }

    fn configure(
        &mut self,
        _tag: &MetricTag,
        _resources: &Resources<f64>,
    ) -> Result<(), EnsembleError> {
        Ok(())
    }

    fn absorb(&mut self, _item: &f64, _ordinal: usize) -> Result<(), EnsembleError> {
        self.seen += 1;
        Ok(())
    }

    fn finalize_and_render(&mut self) -> Result<String, EnsembleError> {
        Ok(format!("\tcount:\t{}", self.seen))
    }

    fn value(&self, metric_name: &str) -> Result<f64, EnsembleError> {
        match metric_name {
            "count" => Ok(self.seen as f64),
            other => Err(EnsembleError::NotFound(ErrorInfo::new("counter.unknown", other))),
        }
    }

    fn clear(&mut self) {
        self.seen = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn kinds_without_support_fail_loudly() {
    let mesh = ChannelTransport::mesh(2);
    let mut metric: EnsembleMetric<f64> = EnsembleMetric::new(Box::new(Counter { seen: 0 }));
    assert!(!metric.supports_distributed_collection());

    let err = metric.send_summary(&mesh[0], 1).expect_err("send unsupported");
    assert!(matches!(err, EnsembleError::Unsupported(_)));
    let err = metric.receive_summary(&mesh[1]).expect_err("receive unsupported");
    assert!(matches!(err, EnsembleError::Unsupported(_)));
    assert_eq!(err.code(), "ensemble.distributed_collection");

    metric.apply(&1.0).expect("apply");
    metric.report().expect("report");
    assert_eq!(metric.get_value("count").expect("count"), 1.0);
}
