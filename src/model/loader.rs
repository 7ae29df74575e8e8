use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FALLBACK_SERIES_NAME: &str = "series";

#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub name: String,
    pub slices: Vec<Arc<[u8]>>,
}

pub fn load_series(paths: Vec<PathBuf>) -> Vec<Result<LoadedSeries, String>> {
    let mut grouped: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        grouped.entry(parent).or_default().push(path);
    }

    let mut results = Vec::new();
    for (directory, mut files) in grouped {
        files.sort();
        let name = series_name(&directory);
        log::info!("Loading series `{name}` ({} file(s))", files.len());

        let mut slices = Vec::with_capacity(files.len());
        for file in files {
            match std::fs::read(&file) {
                Ok(bytes) => slices.push(Arc::from(bytes)),
                Err(err) => {
                    let message = format!("{}: failed to read slice ({err})", file.display());
                    log::error!("{message}");
                    results.push(Err(message));
                }
            }
        }

        if !slices.is_empty() {
            results.push(Ok(LoadedSeries { name, slices }));
        }
    }
    results
}

fn series_name(directory: &Path) -> String {
    directory
        .file_name()
        .map(|name| name.to_string_lossy().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_SERIES_NAME.to_string())
}
