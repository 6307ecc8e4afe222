use std::fmt;
use std::path::{Path, PathBuf};

use canonical_error::{CanonicalError, invalid_argument_error};
use log::{info, warn};

use crate::cutout::{CutoutFetcher, CutoutRequest,
                    DEFAULT_HEIGHT_PX, DEFAULT_WIDTH_PX};
use crate::render::{self, Colormap};
use crate::resolver_trait::NameResolver;

// Single-image mode always writes to this name, overwriting any previous
// figure. Concurrent invocations sharing an output directory will race on it.
pub const SINGLE_OUTPUT_NAME: &str = "fig.jpg";

/// Workflow failure, by stage. The wrapped error's code identifies the
/// specific cause (NotFound, InvalidArgument, Unavailable, ...).
#[derive(Debug)]
pub enum WorkflowError {
    Resolution(CanonicalError),
    Fetch { survey: String, error: CanonicalError },
    Render(CanonicalError),
    Output(CanonicalError),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::Resolution(e) =>
                write!(f, "Name resolution failed: {}", e.message),
            WorkflowError::Fetch{survey, error} =>
                write!(f, "Fetching survey '{}' failed: {}",
                       survey, error.message),
            WorkflowError::Render(e) =>
                write!(f, "Rendering failed: {}", e.message),
            WorkflowError::Output(e) =>
                write!(f, "Writing output failed: {}", e.message),
        }
    }
}

impl std::error::Error for WorkflowError {}

/// Per-survey outcome of a grid run.
#[derive(Debug)]
pub struct PanelOutcome {
    pub survey: String,
    /// None if the panel rendered from a fetched image; the fetch error if
    /// the panel is a placeholder.
    pub error: Option<CanonicalError>,
}

/// Aggregate result of a grid run. The figure exists even when some panels
/// failed; callers decide how to treat partial success.
#[derive(Debug)]
pub struct GridReport {
    pub output: PathBuf,
    pub panels: Vec<PanelOutcome>,
}

impl GridReport {
    pub fn failed_count(&self) -> usize {
        self.panels.iter().filter(|p| p.error.is_some()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Sequential cutout-and-render workflows over a resolver and a fetcher.
/// Blocking; run one workflow at a time per output directory.
pub struct Pipeline {
    resolver: Box<dyn NameResolver>,
    fetcher: Box<dyn CutoutFetcher>,
    output_dir: PathBuf,
}

impl Pipeline {
    pub fn new(resolver: Box<dyn NameResolver>,
               fetcher: Box<dyn CutoutFetcher>,
               output_dir: &Path) -> Self {
        Pipeline{resolver, fetcher, output_dir: output_dir.to_path_buf()}
    }

    /// Resolves `target_id`, fetches one cutout from `survey`, renders it
    /// with `cmap_name` and saves the figure as "fig.jpg" in the output
    /// directory. Returns the path of the written figure.
    pub fn render_single(&self, target_id: &str, frame: &str, survey: &str,
                         cmap_name: &str, fov_deg: f64)
                         -> Result<PathBuf, WorkflowError> {
        let colormap = Colormap::by_name(cmap_name)
            .map_err(WorkflowError::Render)?;
        let target = self.resolver.resolve(target_id, frame)
            .map_err(WorkflowError::Resolution)?;
        let request = CutoutRequest::new(&target, survey, fov_deg,
                                         DEFAULT_WIDTH_PX, DEFAULT_HEIGHT_PX);
        let image = self.fetcher.fetch(&request).map_err(
            |error| WorkflowError::Fetch{survey: survey.to_string(), error})?;
        let panel = render::render_panel(
            &image, &colormap,
            &format!("{}: {}", target.canonical_id, survey));
        let path = self.output_dir.join(SINGLE_OUTPUT_NAME);
        render::save_figure(&panel, &path).map_err(WorkflowError::Output)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Resolves `target_id` once, then fetches and renders one panel per
    /// entry of `surveys` (in order) into a single 1xN figure named from the
    /// canonical identifier.
    ///
    /// Panel failures are isolated: a failing survey yields a placeholder
    /// panel and is recorded in the returned GridReport rather than aborting
    /// the remaining panels.
    pub fn render_grid(&self, target_id: &str, frame: &str,
                       surveys: &[String], cmap_name: &str, fov_deg: f64)
                       -> Result<GridReport, WorkflowError> {
        if surveys.is_empty() {
            return Err(WorkflowError::Render(
                invalid_argument_error("No surveys requested")));
        }
        let colormap = Colormap::by_name(cmap_name)
            .map_err(WorkflowError::Render)?;
        let target = self.resolver.resolve(target_id, frame)
            .map_err(WorkflowError::Resolution)?;

        let mut panels = Vec::with_capacity(surveys.len());
        let mut outcomes = Vec::with_capacity(surveys.len());
        for survey in surveys {
            let title = format!("{} - {}", target.canonical_id, survey);
            let request = CutoutRequest::new(&target, survey, fov_deg,
                                             DEFAULT_WIDTH_PX,
                                             DEFAULT_HEIGHT_PX);
            match self.fetcher.fetch(&request) {
                Ok(image) => {
                    panels.push(render::render_panel(&image, &colormap, &title));
                    outcomes.push(PanelOutcome{survey: survey.clone(),
                                               error: None});
                },
                Err(error) => {
                    warn!("Fetch failed for survey '{}': {}",
                          survey, error.message);
                    panels.push(render::placeholder_panel(&title));
                    outcomes.push(PanelOutcome{survey: survey.clone(),
                                               error: Some(error)});
                },
            }
        }

        let figure = render::compose_row(&panels);
        let path = self.output_dir.join(
            format!("{}_grid.jpg", file_stem(&target.canonical_id)));
        render::save_figure(&figure, &path).map_err(WorkflowError::Output)?;
        let report = GridReport{output: path, panels: outcomes};
        if report.all_succeeded() {
            info!("Wrote {}", report.output.display());
        } else {
            warn!("Wrote {} with {} of {} panels failed",
                  report.output.display(), report.failed_count(),
                  report.panels.len());
        }
        Ok(report)
    }
}

// Canonical identifiers contain spaces and catalog sigils ("* alf Lyr");
// reduce to a filesystem-friendly stem.
fn file_stem(canonical_id: &str) -> String {
    let mut stem = String::new();
    for c in canonical_id.chars() {
        if c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.' {
            stem.push(c);
        } else if !stem.is_empty() && !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "target".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use canonical_error::{CanonicalErrorCode, not_found_error};

    use crate::astro_util::{Frame, SkyCoord};
    use crate::cutout::ImageData;
    use crate::render::{PANEL_HEIGHT, PANEL_WIDTH, TITLE_STRIP_HEIGHT};
    use crate::resolver_trait::TargetInfo;
    use super::*;

    struct FakeResolver {
        fail: bool,
    }

    impl NameResolver for FakeResolver {
        fn resolve(&self, target_id: &str, frame: &str)
                   -> Result<TargetInfo, CanonicalError> {
            if self.fail {
                return Err(not_found_error(
                    format!("No such object '{}'", target_id).as_str()));
            }
            let frame = frame.parse::<Frame>()?;
            Ok(TargetInfo{
                query_id: target_id.to_string(),
                canonical_id: "* alf Lyr".to_string(),
                object_type: "PM*".to_string(),
                spectral_type: "A0Va".to_string(),
                frame,
                coord: SkyCoord::new(279.23473479, 38.78368896),
            })
        }
    }

    struct FakeFetcher {
        fail_surveys: HashSet<String>,
    }

    impl FakeFetcher {
        fn new() -> Self {
            FakeFetcher{fail_surveys: HashSet::new()}
        }

        fn failing(surveys: &[&str]) -> Self {
            FakeFetcher{fail_surveys:
                        surveys.iter().map(|s| s.to_string()).collect()}
        }
    }

    impl CutoutFetcher for FakeFetcher {
        fn fetch(&self, request: &CutoutRequest)
                 -> Result<ImageData, CanonicalError> {
            if self.fail_surveys.contains(&request.survey) {
                return Err(not_found_error(
                    format!("Unknown survey '{}'", request.survey).as_str()));
            }
            let (width, height) = (8, 8);
            let samples = (0..width * height).map(|i| i as f32).collect();
            Ok(ImageData{width, height, samples})
        }
    }

    fn pipeline(dir: &Path, fail_resolver: bool, fail_surveys: &[&str])
                -> Pipeline {
        Pipeline::new(Box::new(FakeResolver{fail: fail_resolver}),
                      Box::new(FakeFetcher::failing(fail_surveys)),
                      dir)
    }

    #[test]
    fn test_single_success() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &[]);
        let path = pipeline.render_single(
            "Vega", "ICRS", "DSS", "gray", 1.0).unwrap();
        assert!(path.ends_with(SINGLE_OUTPUT_NAME));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_single_resolution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), true, &[]);
        let err = pipeline.render_single(
            "notanid", "ICRS", "DSS", "gray", 1.0).unwrap_err();
        match err {
            WorkflowError::Resolution(e) => {
                assert!(matches!(e.code, CanonicalErrorCode::NotFound));
            },
            other => panic!("Expected Resolution error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_unknown_frame() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &[]);
        let err = pipeline.render_single(
            "Vega", "notaframe", "DSS", "gray", 1.0).unwrap_err();
        match err {
            WorkflowError::Resolution(e) => {
                assert!(matches!(e.code, CanonicalErrorCode::InvalidArgument));
            },
            other => panic!("Expected Resolution error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &["notasurvey"]);
        let err = pipeline.render_single(
            "Vega", "ICRS", "notasurvey", "gray", 1.0).unwrap_err();
        match err {
            WorkflowError::Fetch{survey, ..} => {
                assert_eq!(survey, "notasurvey");
            },
            other => panic!("Expected Fetch error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_bad_colormap() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &[]);
        let err = pipeline.render_single(
            "Vega", "ICRS", "DSS", "notacolormap", 1.0).unwrap_err();
        match err {
            WorkflowError::Render(e) => {
                assert!(matches!(e.code, CanonicalErrorCode::InvalidArgument));
            },
            other => panic!("Expected Render error, got {:?}", other),
        }
    }

    #[test]
    fn test_grid_success() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &[]);
        let surveys: Vec<String> =
            ["DSS", "2MASS/J", "GALEX"].iter().map(|s| s.to_string()).collect();
        let report = pipeline.render_grid(
            "Vega", "ICRS", &surveys, "viridis", 1.0).unwrap();
        assert!(report.all_succeeded());
        assert_eq!(report.panels.len(), 3);
        // Panel order follows the survey list order.
        for (outcome, survey) in report.panels.iter().zip(surveys.iter()) {
            assert_eq!(&outcome.survey, survey);
        }

        let figure = image::open(&report.output).unwrap().to_rgb8();
        assert_eq!(figure.width(), 3 * PANEL_WIDTH);
        assert_eq!(figure.height(), TITLE_STRIP_HEIGHT + PANEL_HEIGHT);
    }

    #[test]
    fn test_grid_output_named_from_canonical_id() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &[]);
        let surveys = vec!["DSS".to_string()];
        let report = pipeline.render_grid(
            "Vega", "ICRS", &surveys, "gray", 1.0).unwrap();
        assert_eq!(report.output.file_name().unwrap(), "alf_Lyr_grid.jpg");
    }

    #[test]
    fn test_grid_isolates_panel_failures() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &["notasurvey"]);
        let surveys: Vec<String> =
            ["DSS", "notasurvey", "GALEX"].iter().map(|s| s.to_string()).collect();
        let report = pipeline.render_grid(
            "Vega", "ICRS", &surveys, "gray", 1.0).unwrap();
        assert_eq!(report.failed_count(), 1);
        assert!(!report.all_succeeded());
        assert!(report.panels[0].error.is_none());
        assert!(report.panels[1].error.is_some());
        assert!(report.panels[2].error.is_none());

        // The figure still has all three panels.
        let figure = image::open(&report.output).unwrap().to_rgb8();
        assert_eq!(figure.width(), 3 * PANEL_WIDTH);
    }

    #[test]
    fn test_grid_resolution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), true, &[]);
        let surveys = vec!["DSS".to_string()];
        let err = pipeline.render_grid(
            "notanid", "ICRS", &surveys, "gray", 1.0).unwrap_err();
        assert!(matches!(err, WorkflowError::Resolution(_)));
    }

    #[test]
    fn test_grid_rejects_empty_survey_list() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false, &[]);
        let err = pipeline.render_grid(
            "Vega", "ICRS", &[], "gray", 1.0).unwrap_err();
        assert!(matches!(err, WorkflowError::Render(_)));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("* alf Lyr"), "alf_Lyr");
        assert_eq!(file_stem("M  31"), "M_31");
        assert_eq!(file_stem("NAME Crab Nebula"), "NAME_Crab_Nebula");
        assert_eq!(file_stem("***"), "target");
    }

}  // mod tests.
