use super::*;

pub fn run(args: ExtractArgs) -> Result<()> {
    if !args.input.is_dir() {
        bail!("input directory does not exist: {}", args.input.display());
    }
    let mapping = load_mapping(&args.mapping)?;
    info!(
        mapping = %args.mapping.display(),
        sheets = mapping.sheets.len(),
        fields = mapping.field_count(),
        "loaded extraction mapping"
    );

    let dumps = discover_workbooks(&args.input)?;
    if dumps.is_empty() {
        bail!("no workbook dumps found in {}", args.input.display());
    }

    if args.dry_run {
        info!(
            workbooks = dumps.len(),
            input = %args.input.display(),
            "extract dry-run complete"
        );
        return Ok(());
    }

    let mut documents = Vec::with_capacity(dumps.len());
    let mut failures = Vec::new();
    for path in &dumps {
        let relative = path.strip_prefix(&args.input).unwrap_or(path);
        match extract_workbook(&mapping, path, &args.output.join(relative)) {
            Ok(document) => {
                info!(
                    source = %document.source,
                    output = %document.output,
                    static_fields = document.static_fields,
                    tables = document.tables,
                    "extracted workbook"
                );
                documents.push(document);
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(source = %path.display(), reason = %reason, "skipping workbook");
                failures.push(SkippedDocument {
                    document_id: relative.display().to_string(),
                    reason,
                });
            }
        }
    }

    let manifest = ExtractionManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: now_utc_string(),
        input_directory: args.input.display().to_string(),
        mapping: args.mapping.display().to_string(),
        mapping_sha256: sha256_file(&args.mapping)?,
        document_count: documents.len(),
        documents,
        failures,
    };
    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.output.join(MANIFEST_FILE));
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote extraction manifest");
    info!(
        extracted = manifest.document_count,
        failed = manifest.failures.len(),
        "extraction completed"
    );

    Ok(())
}

fn load_mapping(path: &Path) -> Result<ExtractionMapping> {
    let raw = fs::read(path)
        .with_context(|| format!("failed to read extraction mapping: {}", path.display()))?;
    ExtractionMapping::from_json_slice(&raw)
        .with_context(|| format!("invalid extraction mapping: {}", path.display()))
}

/// Every non-hidden `*.json` file below `root`, sorted.
pub(super) fn discover_workbooks(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

pub(super) fn extract_record(mapping: &ExtractionMapping, source: &impl CellSource) -> Record {
    let mut record = Record::default();
    for (sheet, sheet_mapping) in &mapping.sheets {
        if !source.has_sheet(sheet) {
            debug!(sheet = %sheet, "sheet not in workbook");
            continue;
        }

        let mut block = SheetBlock::default();
        for (field, spec) in &sheet_mapping.static_fields {
            block
                .static_fields
                .insert(field.clone(), spec.extract(source, sheet));
        }
        for (table, spec) in &sheet_mapping.tables {
            let Some(scan) = spec.scan(source, sheet) else {
                warn!(sheet = %sheet, table = %table, "table start not found; table omitted");
                continue;
            };
            if scan.truncated {
                warn!(
                    sheet = %sheet,
                    table = %table,
                    max_rows = spec.max_rows,
                    "table scan stopped at row limit"
                );
            }
            block.tables.insert(table.clone(), scan.rows);
        }
        record.sheets.insert(sheet.clone(), block);
    }
    record
}

fn extract_workbook(
    mapping: &ExtractionMapping,
    source_path: &Path,
    output_path: &Path,
) -> Result<ExtractedDocument> {
    let raw = fs::read(source_path)
        .with_context(|| format!("failed to read workbook dump: {}", source_path.display()))?;
    let workbook = JsonWorkbook::from_json_slice(&raw)
        .with_context(|| format!("invalid workbook dump: {}", source_path.display()))?;
    debug!(source = %source_path.display(), sheets = workbook.sheet_count(), "loaded workbook");

    let record = extract_record(mapping, &workbook);
    record.validate()?;
    write_json_pretty(output_path, &record)?;

    Ok(ExtractedDocument {
        source: source_path.display().to_string(),
        source_sha256: sha256_file(source_path)?,
        output: output_path.display().to_string(),
        sheets: record.sheets.len(),
        static_fields: record
            .sheets
            .values()
            .map(|block| block.static_fields.len())
            .sum(),
        tables: record.sheets.values().map(|block| block.tables.len()).sum(),
    })
}
