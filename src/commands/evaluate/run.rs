use super::*;

pub fn run(args: EvaluateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("eval-{}", utc_compact_string(started_ts));

    info!(
        run_id = %run_id,
        config = %args.config.display(),
        ground_truth = %args.ground_truth.display(),
        predictions = %args.predictions.display(),
        "starting evaluation"
    );

    let config = FieldsConfig::load(&args.config)?;
    if config.is_empty() {
        bail!("no fields configured in {}", args.config.display());
    }
    let config_sha256 = sha256_file(&args.config)?;
    info!(fields = config.len(), "loaded fields config");

    if !args.predictions.is_dir() {
        bail!(
            "predictions directory does not exist: {}",
            args.predictions.display()
        );
    }
    let documents = discover_documents(&args.ground_truth, &args.predictions)?;

    if args.dry_run {
        let paired = documents.iter().filter(|doc| doc.is_paired()).count();
        for document in documents.iter().filter(|doc| !doc.is_paired()) {
            warn!(
                document = %document.document_id,
                reason = document.skip_reason().unwrap_or_default(),
                "document would be skipped"
            );
        }
        info!(
            documents = documents.len(),
            paired,
            fields = config.len(),
            "evaluate dry-run complete"
        );
        return Ok(());
    }

    let evaluation = evaluate_corpus(&config, &documents, args.threads)?;
    let CorpusEvaluation {
        accumulator,
        skipped,
    } = evaluation;
    let summary = accumulator.finish(&config);

    let summary_path = args
        .summary
        .clone()
        .unwrap_or_else(|| args.output.with_extension("txt"));
    let manifest_path = args
        .manifest
        .clone()
        .unwrap_or_else(|| args.output.with_extension("manifest.json"));

    write_report_csv(&args.output, &summary)?;
    info!(path = %args.output.display(), "wrote evaluation report");

    let completed_at = now_utc_string();
    let text = render_summary(&summary, &completed_at, args.top_n);
    write_text(&summary_path, &text)?;
    info!(path = %summary_path.display(), "wrote evaluation summary");
    for line in text.lines() {
        info!("{line}");
    }

    let manifest = EvaluationRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        status: "completed".to_string(),
        started_at,
        completed_at,
        command: std::env::args().collect::<Vec<_>>().join(" "),
        config_sha256,
        fields_configured: config.len(),
        documents_discovered: documents.len(),
        paths: EvaluationPaths {
            ground_truth: args.ground_truth.display().to_string(),
            predictions: args.predictions.display().to_string(),
            config: args.config.display().to_string(),
            report_csv: args.output.display().to_string(),
            summary: summary_path.display().to_string(),
            manifest: manifest_path.display().to_string(),
        },
        skipped,
        summary,
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote evaluation manifest");

    info!(
        processed = manifest.summary.documents_processed,
        skipped = manifest.summary.documents_skipped,
        overall_accuracy = manifest.summary.overall_accuracy,
        "evaluation completed"
    );
    Ok(())
}

/// Per-worker evaluation state.
#[derive(Debug, Default)]
pub(super) struct CorpusEvaluation {
    pub(super) accumulator: EvaluationAccumulator,
    pub(super) skipped: Vec<SkippedDocument>,
}

impl CorpusEvaluation {
    fn skip(&mut self, document_id: &str, reason: String) {
        warn!(document = document_id, reason = %reason, "skipping document");
        self.accumulator.record_skipped();
        self.skipped.push(SkippedDocument {
            document_id: document_id.to_string(),
            reason,
        });
    }

    fn absorb(mut self, config: &FieldsConfig, document: &DocumentPaths) -> Self {
        let (Some(gold_path), Some(predicted_path)) = (&document.ground_truth, &document.prediction)
        else {
            let reason = document.skip_reason().unwrap_or("unpaired document");
            self.skip(&document.document_id, reason.to_string());
            return self;
        };

        let records = load_record(gold_path)
            .and_then(|gold| load_record(predicted_path).map(|predicted| (gold, predicted)));
        match records {
            Ok((gold, predicted)) => {
                let outcomes = evaluate_document(config, &document.document_id, &gold, &predicted);
                self.accumulator.record_document(&outcomes);
                info!(
                    document = %document.document_id,
                    correct = outcomes.iter().filter(|outcome| outcome.is_correct()).count(),
                    fields = outcomes.len(),
                    "evaluated document"
                );
            }
            Err(err) => self.skip(&document.document_id, format!("{err:#}")),
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.accumulator = self.accumulator.merge(other.accumulator);
        self.skipped.extend(other.skipped);
        self
    }
}

/// Evaluates every document in parallel; skipped documents come back sorted by id.
pub(super) fn evaluate_corpus(
    config: &FieldsConfig,
    documents: &[DocumentPaths],
    threads: Option<usize>,
) -> Result<CorpusEvaluation> {
    let work = || {
        documents
            .par_iter()
            .fold(CorpusEvaluation::default, |state, document| {
                state.absorb(config, document)
            })
            .reduce(CorpusEvaluation::default, CorpusEvaluation::merge)
    };

    let mut evaluation = match threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("failed to build evaluation worker pool")?
            .install(work),
        None => work(),
    };
    evaluation
        .skipped
        .sort_by(|left, right| left.document_id.cmp(&right.document_id));
    Ok(evaluation)
}
