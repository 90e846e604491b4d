use std::collections::HashMap;
use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use csv::StringRecord;

use super::SourceOptions;
use crate::services::import::job::{PlaylistImportJob, TrackDescriptor};

/// Column positions resolved from the header row, case-insensitively.
///
/// Three layouts are recognized: a full export (`PlaylistName` plus
/// `MediaId`/`VideoId`), a simple `Title,Artist` listing, and a `URL` column
/// of track links. They can be mixed; per row the id wins over the URL,
/// which wins over title/artist search text.
#[derive(Debug, Default)]
struct HeaderIndex {
    playlist_name: Option<usize>,
    media_id: Option<usize>,
    url: Option<usize>,
    title: Option<usize>,
    artist: Option<usize>,
}

impl HeaderIndex {
    fn new(headers: &StringRecord) -> Self {
        let mut index = Self::default();
        for (position, name) in headers.iter().enumerate() {
            match name.trim().to_lowercase().as_str() {
                "playlistname" => index.playlist_name.get_or_insert(position),
                "mediaid" | "videoid" => index.media_id.get_or_insert(position),
                "url" => index.url.get_or_insert(position),
                "title" => index.title.get_or_insert(position),
                "artists" | "artist" => index.artist.get_or_insert(position),
                _ => continue,
            };
        }
        index
    }

    fn field<'a>(&self, record: &'a StringRecord, position: Option<usize>) -> &'a str {
        position
            .and_then(|position| record.get(position))
            .map(str::trim)
            .unwrap_or("")
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() { None } else { Some(value.to_string()) }
}

/// Read one CSV file into ordered import jobs.
///
/// Rows are grouped by the `PlaylistName` column when present; otherwise the
/// file stem names a single job. Jobs and their tracks keep source order,
/// and each descriptor remembers its 1-based data row for failure reports.
pub fn read_jobs(path: &Path, options: &SourceOptions) -> Result<Vec<PlaylistImportJob>> {
    log::info!("Reading CSV file: {}", path.display());
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .wrap_err_with(|| format!("Failed to open CSV file: {}", path.display()))?;
    let headers = reader
        .headers()
        .wrap_err_with(|| format!("Failed to read CSV header: {}", path.display()))?
        .clone();
    let index = HeaderIndex::new(&headers);

    if index.media_id.is_none() && index.url.is_none() && index.title.is_none() {
        return Err(eyre!(
            "{} has no usable columns; expected MediaId/VideoId, URL or Title",
            path.display()
        ));
    }

    let default_name = (index.playlist_name.is_none())
        .then(|| file_stem_name(path))
        .unwrap_or_default();

    let mut jobs: Vec<PlaylistImportJob> = Vec::new();
    let mut job_index: HashMap<String, usize> = HashMap::new();

    for (row, record) in reader.records().enumerate() {
        let row_number = row as u64 + 1;
        let record = record
            .wrap_err_with(|| format!("Failed to read {} row {row_number}", path.display()))?;

        let name = match index.playlist_name {
            Some(position) => index.field(&record, Some(position)).to_string(),
            None => default_name.clone(),
        };
        if name.is_empty() {
            log::debug!("Skipping row {row_number}: no playlist name");
            continue;
        }

        let descriptor = TrackDescriptor {
            title: index.field(&record, index.title).to_string(),
            artist: index.field(&record, index.artist).to_string(),
            explicit_id: non_empty(index.field(&record, index.media_id)),
            source_url: non_empty(index.field(&record, index.url)),
            row_ref: Some(row_number),
        };

        let position = *job_index.entry(name.clone()).or_insert_with(|| {
            jobs.push(PlaylistImportJob {
                name,
                description: String::new(),
                tracks: Vec::new(),
                append_if_exists: options.append_if_exists,
                visibility: options.visibility,
            });
            jobs.len() - 1
        });
        jobs[position].tracks.push(descriptor);
    }

    let total: usize = jobs.iter().map(|job| job.tracks.len()).sum();
    log::info!(
        "Found {} playlist(s) with {total} track(s) in {}",
        jobs.len(),
        path.display()
    );
    Ok(jobs)
}

fn file_stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "playlist".to_string())
}

/// Expand the import inputs: files are taken as-is, directories contribute
/// their `.csv` entries (sorted, non-recursive).
pub fn collect_csv_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .max_depth(1)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| {
                    entry.file_type().is_file()
                        && entry
                            .path()
                            .extension()
                            .and_then(|extension| extension.to_str())
                            .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"))
                })
                .map(|entry| entry.into_path())
                .collect();
            entries.sort();
            files.extend(entries);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            return Err(eyre!("No such file or directory: {}", input.display()));
        }
    }
    if files.is_empty() {
        return Err(eyre!("No CSV files found"));
    }
    Ok(files)
}
