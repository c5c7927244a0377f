use ens_core::{
    Citation, CitationList, CitedModuleType, EnsembleGenerator, JobContext, JobInfo, Measure,
    MoveStatus, NoJob,
};

#[derive(Clone)]
struct Chain(Vec<u32>);

struct Length;

impl Measure<Chain> for Length {
    fn name(&self) -> &str {
        "length"
    }

    fn calculate(&self, item: &Chain) -> f64 {
        item.0.len() as f64
    }
}

#[derive(Clone)]
struct Extend {
    extras: Vec<Chain>,
}

impl EnsembleGenerator<Chain> for Extend {
    fn name(&self) -> &str {
        "extend"
    }

    fn clone_boxed(&self) -> Box<dyn EnsembleGenerator<Chain>> {
        Box::new(self.clone())
    }

    fn apply(&mut self, item: &mut Chain) -> MoveStatus {
        item.0.push(0);
        MoveStatus::Success
    }

    fn additional_output(&mut self) -> Option<Chain> {
        self.extras.pop()
    }
}

#[test]
fn generator_and_measure_are_object_safe() {
    let measure: Box<dyn Measure<Chain>> = Box::new(Length);
    let generator: Box<dyn EnsembleGenerator<Chain>> = Box::new(Extend {
        extras: vec![Chain(vec![1, 2, 3])],
    });
    let mut copy = generator.clone_boxed();
    let mut item = Chain(vec![7]);
    assert!(copy.apply(&mut item).is_success());
    assert_eq!(measure.calculate(&item), 2.0);
    assert_eq!(copy.additional_output().map(|c| c.0.len()), Some(3));
    assert!(copy.additional_output().is_none());
}

#[test]
fn job_contexts_expose_identifiers() {
    assert_eq!(NoJob.job_name(), None);
    assert_eq!(NoJob.nstruct_index(), None);
    let info = JobInfo::new("run_0001", 1).with_process_rank(3);
    assert_eq!(info.job_name().as_deref(), Some("run_0001"));
    assert_eq!(info.nstruct_index(), Some(1));
    assert_eq!(info.process_rank(), Some(3));
}

#[test]
fn citation_list_deduplicates() {
    let citation = Citation {
        module: "CentralTendency".into(),
        module_type: CitedModuleType::EnsembleMetric,
        authors: "A. Author".into(),
        affiliation: "Lab".into(),
        email: "a@example.org".into(),
        note: "Wrote it.".into(),
    };
    let mut list = CitationList::new();
    list.add(citation.clone());
    list.add(citation);
    assert_eq!(list.len(), 1);
    assert!(list.to_human_readable().contains("CentralTendency"));
}
