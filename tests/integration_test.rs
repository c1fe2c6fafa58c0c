//! End-to-end tests for the library pipeline
//!
//! These drive detection, transformation, gating and training through the
//! public API, the way an embedding tool would.

use std::sync::Arc;

use saferefactor::classifier::{
    FeatureVector, HyperparameterGrid, SplitCriterion, FEATURE_VERSION,
};
use saferefactor::{
    AnalysisError, FeatureExtractor, GatingPolicy, LabeledExample, PatternDetector, PatternKind,
    RefactorPipeline, RiskClassifier, SourceUnit, TrainConfig, TrainError, TrainedModel,
    TrainingPipeline, Transformer,
};

/// Classifier with a fixed answer
struct Constant(f64);

impl RiskClassifier for Constant {
    fn predict(&self, _features: &FeatureVector) -> f64 {
        self.0
    }

    fn feature_version(&self) -> u32 {
        FEATURE_VERSION
    }
}

fn transform_only(source: &str) -> Vec<Result<saferefactor::RewriteCandidate, AnalysisError>> {
    let unit = SourceUnit::new("test.py", source);
    let matches = PatternDetector::new().detect(&unit).expect("should parse");
    let transformer = Transformer::new();
    matches.iter().map(|m| transformer.transform(m)).collect()
}

#[test]
fn test_accumulation_loop_becomes_comprehension() {
    let source = "result = []\nfor i in items: result.append(i*2)\n";
    let unit = SourceUnit::new("loop.py", source);
    let matches = PatternDetector::new().detect(&unit).expect("should parse");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].kind, PatternKind::AccumulationLoop);

    let candidate = Transformer::new()
        .transform(&matches[0])
        .expect("should transform");
    assert_eq!(candidate.after_text, "result = [i*2 for i in items]");
    assert_eq!(candidate.after_text.lines().count(), 1);
}

#[test]
fn test_nested_conditional_is_collapsed() {
    let source = "if a:\n  if b:\n    print(c)\n";
    let unit = SourceUnit::new("nested.py", source);
    let matches = PatternDetector::new().detect(&unit).expect("should parse");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].kind, PatternKind::NestedConditional);

    let candidate = Transformer::new()
        .transform(&matches[0])
        .expect("should transform");
    assert!(candidate.after_text.starts_with("if a and b:"));
    assert!(candidate.after_text.contains("print(c)"));
}

#[test]
fn test_nested_conditional_with_else_is_not_matched() {
    let source = "if a:\n  if b:\n    print(c)\nelse:\n  print(d)\n";
    let unit = SourceUnit::new("nested.py", source);
    assert!(PatternDetector::new()
        .detect(&unit)
        .expect("should parse")
        .is_empty());
}

#[test]
fn test_conditional_chain_keeps_every_key_and_default() {
    let source = "\
def label(code):
    if code == 200:
        return 'ok'
    elif code == 404:
        return 'missing'
    elif code == 500:
        return 'error'
    else:
        return 'unknown'
";
    let mut found = transform_only(source);
    assert_eq!(found.len(), 1);
    let candidate = found.remove(0).expect("should transform");
    for key in ["200: 'ok'", "404: 'missing'", "500: 'error'"] {
        assert!(candidate.after_text.contains(key), "missing {key}");
    }
    assert!(candidate.after_text.ends_with(".get(code, 'unknown')"));
    assert_eq!(candidate.indent, "    ");
}

#[test]
fn test_short_chain_is_not_reported() {
    let source = "if x == 1:\n    a()\nelif x == 2:\n    b()\n";
    assert!(transform_only(source).is_empty());
}

#[test]
fn test_feature_extraction_is_pure() {
    let extractor = FeatureExtractor::new();
    let before = "r = []\nfor x in xs:\n    r.append(x)";
    let after = "r = [x for x in xs]";
    let a = extractor.extract(before, after).expect("parse");
    let b = extractor.extract(before, after).expect("parse");
    assert_eq!(a, b);
    assert_eq!(a.version, FEATURE_VERSION);
}

#[test]
fn test_threshold_decides_same_candidate_both_ways() {
    let mut found = transform_only("if a:\n  if b:\n    print(c)\n");
    let candidate = found.remove(0).expect("should transform");
    let classifier = Constant(0.23);

    let lenient = GatingPolicy::new(0.5).expect("valid threshold");
    let decision = lenient.decide(&candidate, &classifier).expect("decide");
    assert!(decision.accepted);
    assert_eq!(decision.probability, 0.23);

    let strict = GatingPolicy::new(0.1).expect("valid threshold");
    let decision = strict.decide(&candidate, &classifier).expect("decide");
    assert!(!decision.accepted);
    assert_eq!(decision.threshold, 0.1);
}

#[test]
fn test_pipeline_rewrites_only_accepted_units() {
    let units = vec![
        SourceUnit::new(
            "a.py",
            "def f(xs):\n    out = []\n    for x in xs:\n        out.append(x + 1)\n    return out\n",
        ),
        SourceUnit::new("b.py", "def g(:\n    pass\n"),
    ];
    let pipeline = RefactorPipeline::default().with_classifier(Arc::new(Constant(0.05)));
    let reports = pipeline.analyze_batch(&units);

    assert_eq!(
        reports[0].rewritten_source(),
        "def f(xs):\n    out = [x + 1 for x in xs]\n    return out\n"
    );
    assert!(reports[1].decisions.is_empty());
    assert_eq!(reports[1].rewritten_source(), units[1].text());
}

/// Pairs labelled by whether the rewrite deepened the code.
fn labelled_examples(n: usize) -> Vec<LabeledExample> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                LabeledExample::new(
                    format!("acc = []\nfor v in data{i}:\n    acc.append(v)"),
                    format!("acc = [v for v in data{i}]"),
                    false,
                )
            } else {
                LabeledExample::new(
                    format!("x{i} = 1"),
                    format!("for a in b:\n    for c in d:\n        if e:\n            x{i} = 1"),
                    true,
                )
            }
        })
        .collect()
}

fn quick_config() -> TrainConfig {
    TrainConfig {
        seed: 11,
        grid: HyperparameterGrid {
            n_trees: vec![8],
            max_depth: vec![None],
            min_samples_split: vec![2],
            criteria: vec![SplitCriterion::Gini, SplitCriterion::Entropy],
        },
        ..TrainConfig::default()
    }
}

#[test]
fn test_single_class_training_leaves_saved_model_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_path = dir.path().join("model.json");

    let report = TrainingPipeline::new(quick_config())
        .train(&labelled_examples(20))
        .expect("should train");
    report.model.save(&model_path).expect("save");
    let saved = std::fs::read(&model_path).expect("read");

    let all_safe: Vec<LabeledExample> = labelled_examples(20)
        .into_iter()
        .filter(|e| !e.error_introduced)
        .chain(labelled_examples(20).into_iter().filter(|e| !e.error_introduced))
        .collect();
    let err = TrainingPipeline::new(quick_config())
        .train(&all_safe)
        .expect_err("single class");
    assert_eq!(err, TrainError::SingleClassData { label: 0 });

    assert_eq!(std::fs::read(&model_path).expect("read"), saved);
    let loaded = TrainedModel::load(&model_path).expect("load");
    assert_eq!(loaded, report.model);
}

#[test]
fn test_trained_model_gates_pipeline() {
    let report = TrainingPipeline::new(quick_config())
        .train(&labelled_examples(30))
        .expect("should train");
    let model = Arc::new(report.model);

    let fv = FeatureExtractor::new()
        .extract("x = 1", "x = 1")
        .expect("parse");
    assert_eq!(model.predict(&fv), model.predict(&fv));

    let pipeline = RefactorPipeline::new(
        PatternDetector::new(),
        GatingPolicy::new(1.0).expect("valid threshold"),
    )
    .with_classifier(model);
    let unit = SourceUnit::new("c.py", "acc = []\nfor v in data:\n    acc.append(v)\n");
    let result = pipeline.analyze(&unit);
    assert_eq!(result.decisions.len(), 1);
    assert!(result.decisions[0].accepted);
    assert!((0.0..=1.0).contains(&result.decisions[0].probability));
}
