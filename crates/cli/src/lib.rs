use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use pdf_editor_core::{
    AnnotationEditor, EditMode, EditorConfig, FileList, FileRef, Point, StoreOutcome,
};
use pdf_engine::{default_engine, OpenSource, PdfEngine};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pdf-annotate")]
#[command(about = "Draw line annotations onto a PDF page")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Editor configuration file (TOML).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a page, with any scripted annotations, to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        zoom: Option<f32>,
        /// Pointer script replayed before rendering.
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a pointer script and save the annotated page as a new PDF.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        script: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        zoom: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ModeArg {
    Draw,
    Erase,
    View,
}

impl From<ModeArg> for EditMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Draw => EditMode::Draw,
            ModeArg::Erase => EditMode::Erase,
            ModeArg::View => EditMode::View,
        }
    }
}

/// One scripted editor interaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Mode { mode: ModeArg },
    Color { hex: String },
    Swatch { index: usize },
    Width { width: f32 },
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    ZoomIn,
    ZoomOut,
    Page { number: u32 },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    page_sizes_pt: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct AnnotateOutput {
    output: String,
    page: u32,
    strokes: usize,
    commands: usize,
    stored: bool,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, zoom, script, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_render(&file, page, zoom, script.as_deref(), output.as_deref(), config)
        }
        Commands::Annotate { file, script, page, zoom, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_annotate(&file, &script, page, zoom, output.as_deref(), config)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    // RUST_LOG, when set, wins over the flag.
    let _ = env_logger::builder().filter_level(level).parse_default_env().try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let config = match path {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EditorConfig::default(),
    };
    config.with_env_overrides().context("invalid PDF_ANNOTATE_* environment override")
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let page_sizes_pt = (0..page_count)
        .map(|index| {
            engine
                .page_size(handle, index)
                .map(|size| PageSizeOutput { width: size.width_pt, height: size.height_pt })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let payload = InfoOutput { path: file.display().to_string(), page_count, page_sizes_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_render(
    file: &Path,
    page: u32,
    zoom: Option<f32>,
    script: Option<&Path>,
    output: Option<&Path>,
    config: EditorConfig,
) -> Result<()> {
    let mut editor = open_editor(file, page, zoom, config)?;
    if let Some(script) = script {
        replay(&mut editor, &read_script(script)?)?;
    }

    let image = editor.composite().context("no page has been rendered")?;
    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| derived_output(file, &format!("page-{}", editor.page_number()), "png"));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_annotate(
    file: &Path,
    script: &Path,
    page: u32,
    zoom: Option<f32>,
    output: Option<&Path>,
    config: EditorConfig,
) -> Result<()> {
    let steps = read_script(script)?;
    let mut editor = open_editor(file, page, zoom, config)?;
    replay(&mut editor, &steps)?;

    let mut store = FileList::new();
    store.push(editor.file().clone());
    let report = editor.save(Some(&mut store)).context("failed to save annotated page")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| derived_output(file, "annotated", "pdf"));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = report.file.read_bytes()?;
    fs::write(&output, bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    let payload = AnnotateOutput {
        output: output.display().to_string(),
        page: editor.page_number(),
        strokes: editor.strokes().len(),
        commands: report.line_count,
        stored: matches!(report.outcome, StoreOutcome::Replaced { .. }),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    editor.close();
    Ok(())
}

fn open_editor(
    file: &Path,
    page: u32,
    zoom: Option<f32>,
    config: EditorConfig,
) -> Result<AnnotationEditor> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let file_ref = FileRef::from_path(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut editor = AnnotationEditor::open(file_ref, page, Box::new(default_engine()), config)?;

    if !editor.is_ready() {
        editor.retry_load().context("failed to open PDF")?;
    }
    if editor.page_number() != page {
        anyhow::bail!("page {page} out of range (page_count={})", editor.page_count());
    }
    if let Some(zoom) = zoom {
        editor.set_zoom(zoom)?;
    }

    Ok(editor)
}

fn read_script(path: &Path) -> Result<Vec<Step>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid pointer script {}", path.display()))
}

fn replay(editor: &mut AnnotationEditor, steps: &[Step]) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        apply_step(editor, step).with_context(|| format!("script step {} ({step:?})", index + 1))?;
    }
    log::info!("replayed {} steps, {} strokes", steps.len(), editor.strokes().len());
    Ok(())
}

fn apply_step(editor: &mut AnnotationEditor, step: &Step) -> Result<()> {
    match step {
        Step::Mode { mode } => editor.set_mode((*mode).into()),
        Step::Color { hex } => {
            editor.set_color(hex)?;
        }
        Step::Swatch { index } => {
            editor.select_swatch(*index)?;
        }
        Step::Width { width } => {
            let applied = editor.set_stroke_width(*width);
            if applied != *width {
                log::warn!("stroke width {width} adjusted to {applied}");
            }
        }
        Step::Down { x, y } => editor.pointer_down(Point::new(*x, *y))?,
        Step::Move { x, y } => editor.pointer_move(Point::new(*x, *y))?,
        Step::Up => editor.pointer_up()?,
        Step::ZoomIn => {
            editor.zoom_in()?;
        }
        Step::ZoomOut => {
            editor.zoom_out()?;
        }
        Step::Page { number } => editor.set_page(*number)?,
    }
    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn derived_output(file: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}-{suffix}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pointer_script() {
        let steps: Vec<Step> = serde_json::from_str(
            r##"[
                {"op": "mode", "mode": "draw"},
                {"op": "color", "hex": "#FF0000"},
                {"op": "width", "width": 6},
                {"op": "down", "x": 10, "y": 10},
                {"op": "move", "x": 50, "y": 10.5},
                {"op": "up"},
                {"op": "zoom_in"},
                {"op": "page", "number": 2}
            ]"##,
        )
        .unwrap();

        assert_eq!(steps.len(), 8);
        assert_eq!(steps[0], Step::Mode { mode: ModeArg::Draw });
        assert_eq!(steps[4], Step::Move { x: 50.0, y: 10.5 });
        assert_eq!(steps[6], Step::ZoomIn);
    }

    #[test]
    fn rejects_unknown_operations() {
        assert!(serde_json::from_str::<Vec<Step>>(r#"[{"op": "lasso"}]"#).is_err());
    }

    #[test]
    fn derives_output_next_to_input() {
        assert_eq!(
            derived_output(Path::new("/tmp/docs/report.pdf"), "annotated", "pdf"),
            PathBuf::from("/tmp/docs/report-annotated.pdf")
        );
        assert_eq!(
            derived_output(Path::new("scan.pdf"), "page-3", "png"),
            PathBuf::from("scan-page-3.png")
        );
    }
}
