//! Deployment-dependent path resolution.
//!
//! Everything that differs between a packaged install and a development
//! checkout is decided here, once, and carried around as [`ResolvedPaths`].

use crate::model::{DeploymentMode, FormatToken, RESULTS_FILE_EXT, RESULTS_FILE_NAME};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Entry script the interpreter runs.
pub const ENGINE_SCRIPT: &str = "ecqm_dedupe.py";

const APP_DIR_NAME: &str = "deduplifhir";
const PACKAGED_ENV_DIR: &str = "dedupe-env";
const DEV_VENV_DIR: &str = ".venv";
const SCRIPT_DIR: &str = "cli";

/// Interpreters in preference order, relative to the environment root.
/// Several versions may be bundled; the first one found wins.
const INTERPRETER_CANDIDATES: &[&str] = &[
    "bin/python3.12",
    "bin/python3.11",
    "bin/python3.10",
    "bin/python3.9",
    "bin/python3",
    "bin/python",
    "Scripts/python.exe",
];

#[derive(Debug, Error)]
#[error("dedupe engine not found ({mode} mode); looked for: {}", display_candidates(.candidates))]
pub struct EngineNotFoundError {
    pub mode: DeploymentMode,
    pub candidates: Vec<PathBuf>,
}

fn display_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Directories the resolver starts from.
#[derive(Debug, Clone)]
pub struct PathRoots {
    /// Bundled resources directory (packaged mode).
    pub resources_dir: PathBuf,
    /// Checkout root holding `.venv/` and `cli/` (development mode).
    pub project_root: PathBuf,
    /// Application-private data directory (packaged-mode output).
    pub user_data_dir: PathBuf,
    /// Directory offered by default in the save prompt (packaged mode).
    pub save_dir: PathBuf,
}

impl PathRoots {
    /// Derive roots from the running executable and platform directories.
    pub fn discover(
        resources_dir: Option<PathBuf>,
        project_root: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> std::io::Result<Self> {
        let resources_dir = match resources_dir {
            Some(p) => p,
            None => default_resources_dir()?,
        };
        let project_root = match project_root {
            Some(p) => p,
            None => std::env::current_dir()?,
        };
        let user_data_dir = data_dir.unwrap_or_else(default_user_data_dir);
        let save_dir = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| user_data_dir.clone());
        Ok(Self {
            resources_dir,
            project_root,
            user_data_dir,
            save_dir,
        })
    }
}

fn default_resources_dir() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(dir.join("resources"))
}

/// `<platform data dir>/deduplifhir`, falling back to a dot-directory in the cwd.
pub fn default_user_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(format!(".{APP_DIR_NAME}")))
}

/// Packaged when a bundled resources directory sits next to the executable.
pub fn detect_mode(roots: &PathRoots) -> DeploymentMode {
    if roots.resources_dir.is_dir() {
        DeploymentMode::Packaged
    } else {
        DeploymentMode::Development
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLocation {
    pub interpreter: PathBuf,
    pub script_dir: PathBuf,
}

impl EngineLocation {
    pub fn script(&self) -> PathBuf {
        self.script_dir.join(ENGINE_SCRIPT)
    }
}

fn env_root(mode: DeploymentMode, roots: &PathRoots) -> PathBuf {
    match mode {
        DeploymentMode::Packaged => roots.resources_dir.join(PACKAGED_ENV_DIR),
        DeploymentMode::Development => roots.project_root.join(DEV_VENV_DIR),
    }
}

fn script_dir(mode: DeploymentMode, roots: &PathRoots) -> PathBuf {
    match mode {
        DeploymentMode::Packaged => roots.resources_dir.join(SCRIPT_DIR),
        DeploymentMode::Development => roots.project_root.join(SCRIPT_DIR),
    }
}

/// Candidate interpreter paths for `mode`, in the order they are probed.
pub fn interpreter_candidates(mode: DeploymentMode, roots: &PathRoots) -> Vec<PathBuf> {
    let base = env_root(mode, roots);
    INTERPRETER_CANDIDATES
        .iter()
        .map(|rel| base.join(rel))
        .collect()
}

/// Find the engine interpreter and script directory. First match wins.
pub fn locate_engine(
    mode: DeploymentMode,
    roots: &PathRoots,
) -> Result<EngineLocation, EngineNotFoundError> {
    let candidates = interpreter_candidates(mode, roots);
    match candidates.iter().find(|c| c.is_file()) {
        Some(interpreter) => Ok(EngineLocation {
            interpreter: interpreter.clone(),
            script_dir: script_dir(mode, roots),
        }),
        None => Err(EngineNotFoundError { mode, candidates }),
    }
}

/// All mode-dependent locations, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub mode: DeploymentMode,
    pub engine: EngineLocation,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub save_dir: PathBuf,
}

pub fn resolve_paths(
    mode: DeploymentMode,
    roots: &PathRoots,
) -> Result<ResolvedPaths, EngineNotFoundError> {
    let engine = locate_engine(mode, roots)?;
    let (output_dir, save_dir) = match mode {
        DeploymentMode::Packaged => (roots.user_data_dir.clone(), roots.save_dir.clone()),
        DeploymentMode::Development => (roots.project_root.clone(), roots.project_root.clone()),
    };
    Ok(ResolvedPaths {
        mode,
        work_dir: engine.script_dir.clone(),
        engine,
        output_dir,
        save_dir,
    })
}

/// `deduped_record_mapping_<TOKEN>.xlsx`
pub fn result_file_name(format: FormatToken) -> String {
    format!("{RESULTS_FILE_NAME}_{}.{RESULTS_FILE_EXT}", format.as_arg())
}

impl ResolvedPaths {
    /// Where the engine writes its artifact for `format`.
    /// Deterministic, so the save flow can recompute it after the job.
    pub fn result_file(&self, format: FormatToken) -> PathBuf {
        self.output_dir.join(result_file_name(format))
    }

    /// Default destination offered by the save prompt.
    pub fn default_save_path(&self, format: FormatToken) -> PathBuf {
        self.save_dir.join(result_file_name(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn roots_in(dir: &Path) -> PathRoots {
        PathRoots {
            resources_dir: dir.join("resources"),
            project_root: dir.join("checkout"),
            user_data_dir: dir.join("data"),
            save_dir: dir.join("downloads"),
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn development_prefers_first_existing_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots_in(tmp.path());
        let venv = roots.project_root.join(".venv");
        touch(&venv.join("bin/python3"));
        touch(&venv.join("bin/python3.10"));

        let loc = locate_engine(DeploymentMode::Development, &roots).unwrap();
        assert_eq!(loc.interpreter, venv.join("bin/python3.10"));
        assert_eq!(loc.script_dir, roots.project_root.join("cli"));
        assert_eq!(loc.script(), roots.project_root.join("cli").join(ENGINE_SCRIPT));
    }

    #[test]
    fn development_falls_through_to_later_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots_in(tmp.path());
        let python = roots.project_root.join(".venv/bin/python");
        touch(&python);

        let loc = locate_engine(DeploymentMode::Development, &roots).unwrap();
        assert_eq!(loc.interpreter, python);
    }

    #[test]
    fn missing_engine_reports_every_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots_in(tmp.path());
        let err = locate_engine(DeploymentMode::Development, &roots).unwrap_err();
        assert_eq!(err.mode, DeploymentMode::Development);
        assert_eq!(err.candidates.len(), INTERPRETER_CANDIDATES.len());
        assert!(err.to_string().contains("python3.12"));
    }

    #[test]
    fn directory_is_not_an_interpreter() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots_in(tmp.path());
        fs::create_dir_all(roots.project_root.join(".venv/bin/python3.12")).unwrap();
        assert!(locate_engine(DeploymentMode::Development, &roots).is_err());
    }

    #[test]
    fn packaged_paths_use_resources_and_user_data() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots_in(tmp.path());
        touch(&roots.resources_dir.join("dedupe-env/bin/python3.11"));
        assert_eq!(detect_mode(&roots), DeploymentMode::Packaged);

        let paths = resolve_paths(DeploymentMode::Packaged, &roots).unwrap();
        assert_eq!(paths.work_dir, roots.resources_dir.join("cli"));
        assert_eq!(
            paths.result_file(FormatToken::Csv),
            roots.user_data_dir.join("deduped_record_mapping_CSV.xlsx")
        );
        assert_eq!(
            paths.default_save_path(FormatToken::Fhir),
            roots.save_dir.join("deduped_record_mapping_FHIR.xlsx")
        );
    }

    #[test]
    fn development_output_lives_in_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots_in(tmp.path());
        touch(&roots.project_root.join(".venv/bin/python3"));
        assert_eq!(detect_mode(&roots), DeploymentMode::Development);

        let paths = resolve_paths(DeploymentMode::Development, &roots).unwrap();
        assert_eq!(paths.output_dir, roots.project_root);
        assert_eq!(
            paths.result_file(FormatToken::Test),
            roots.project_root.join("deduped_record_mapping_TEST.xlsx")
        );
        assert_eq!(paths.save_dir, roots.project_root);
    }
}
