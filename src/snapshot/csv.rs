use crate::Result;
use crate::table::{Cell, Frame, Snapshot, format_timestamp};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use ohno::{EnrichableExt, IntoAppError};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Read, Write};

const LOG_TARGET: &str = "  snapshot";

/// File name of the snapshot collected at `collected_at`.
#[must_use]
pub fn file_name(collected_at: DateTime<Utc>) -> String {
    format!("tech_metrics_{}.csv", collected_at.format("%Y%m%d_%H%M%S"))
}

/// Write `snapshot` into `dir`, creating the directory if needed.
///
/// Fails if a snapshot with the same name already exists.
pub fn write_snapshot(dir: &Utf8Path, snapshot: &Snapshot) -> Result<Utf8PathBuf> {
    fs::create_dir_all(dir).into_app_err_with(|| format!("unable to create snapshot directory '{dir}'"))?;

    let path = dir.join(file_name(snapshot.collected_at()));
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .into_app_err_with(|| format!("unable to create snapshot file '{path}'"))?;

    let mut writer = BufWriter::new(file);
    write(&mut writer, snapshot).map_err(|e| e.enrich_with(|| format!("unable to write snapshot file '{path}'")))?;

    let file = writer.into_inner().into_app_err_with(|| format!("unable to flush snapshot file '{path}'"))?;
    file.sync_all()?;

    log::info!(target: LOG_TARGET, "wrote {} row(s) to '{path}'", snapshot.len());
    Ok(path)
}

/// Write `snapshot` as CSV: a header row, then one row per record.
pub fn write<W: Write>(writer: W, snapshot: &Snapshot) -> Result<()> {
    let frame = snapshot.to_frame();
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(frame.columns())?;
    for row in frame.rows() {
        csv_writer.write_record(row.iter().map(render))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Read a snapshot file back into a frame. Empty fields become null.
///
/// The frame is not validated.
pub fn read<R: Read>(reader: R) -> Result<Frame> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader.headers()?.iter().map(str::to_string).collect();
    let mut frame = Frame::new(headers);

    let mut record = csv::StringRecord::new();
    while csv_reader.read_record(&mut record)? {
        let row = record
            .iter()
            .map(|field| if field.is_empty() { Cell::Null } else { Cell::Str(field.to_string()) })
            .collect();
        frame.push_row(row)?;
    }

    Ok(frame)
}

pub fn read_snapshot(path: &Utf8Path) -> Result<Frame> {
    let file = fs::File::open(path).into_app_err_with(|| format!("unable to open snapshot file '{path}'"))?;
    read(file).map_err(|e| e.enrich_with(|| format!("unable to read snapshot file '{path}'")))
}

fn render(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Int(v) => v.to_string(),
        Cell::Str(s) => s.clone(),
        Cell::Timestamp(t) => format_timestamp(*t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{UnifiedRecord, validate};

    fn at(epoch: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(epoch, 0).unwrap()
    }

    fn records() -> Vec<UnifiedRecord> {
        vec![
            UnifiedRecord {
                technology: "Foo".to_string(),
                github_repo: "org/foo".to_string(),
                github_stars: 10,
                github_forks: 2,
                github_watchers: 0,
                github_open_issues: 1,
                github_default_branch: "main".to_string(),
                github_latest_released_at: Some(at(1_704_067_200)),
                github_last_commit_at: Some(at(1_717_200_000)),
                pypi_package: "foo".to_string(),
                pypi_downloads_last_day: 5,
                pypi_downloads_last_week: 40,
                pypi_downloads_last_month: 150,
                ingested_at: at(1_717_322_400),
            },
            UnifiedRecord {
                technology: "Bar, the \"tool\"".to_string(),
                github_repo: "org/bar".to_string(),
                github_stars: 0,
                github_forks: 0,
                github_watchers: 0,
                github_open_issues: 0,
                github_default_branch: String::new(),
                github_latest_released_at: None,
                github_last_commit_at: None,
                pypi_package: "bar".to_string(),
                pypi_downloads_last_day: 0,
                pypi_downloads_last_week: 0,
                pypi_downloads_last_month: 0,
                ingested_at: at(1_717_322_400),
            },
        ]
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(at(1_717_322_400)), "tech_metrics_20240602_100000.csv");
    }

    #[test]
    fn test_write_csv() {
        let snapshot = Snapshot::new(at(1_717_322_400), records());
        let mut buf = Vec::new();
        write(&mut buf, &snapshot).unwrap();

        insta::assert_snapshot!(String::from_utf8(buf).unwrap());
    }

    #[test]
    fn test_write_read_validate_round_trip() {
        let snapshot = Snapshot::new(at(1_717_322_400), records());
        let mut buf = Vec::new();
        write(&mut buf, &snapshot).unwrap();

        let frame = read(buf.as_slice()).unwrap();
        let back = validate(frame).unwrap();
        assert_eq!(back, snapshot.records());
    }

    #[test]
    fn test_round_trip_keeps_fractional_seconds() {
        let mut recs = records();
        recs[0].ingested_at = DateTime::from_timestamp(1_717_322_400, 123_000_000).unwrap();
        let snapshot = Snapshot::new(at(1_717_322_400), recs);

        let mut buf = Vec::new();
        write(&mut buf, &snapshot).unwrap();
        let back = validate(read(buf.as_slice()).unwrap()).unwrap();
        assert_eq!(back[0].ingested_at, snapshot.records()[0].ingested_at);
    }

    #[test]
    fn test_read_rejects_ragged_rows() {
        let text = "A,B\n1,2\n3\n";
        assert!(read(text.as_bytes()).is_err());
    }

    #[test]
    fn test_write_snapshot_creates_dir_and_never_overwrites() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("artifacts")).unwrap();
        let snapshot = Snapshot::new(at(1_717_322_400), records());

        let path = write_snapshot(&dir, &snapshot).unwrap();
        assert_eq!(path, dir.join("tech_metrics_20240602_100000.csv"));

        let frame = read_snapshot(&path).unwrap();
        assert_eq!(frame.len(), 2);

        let before = fs::read(&path).unwrap();
        assert!(write_snapshot(&dir, &Snapshot::new(at(1_717_322_400), Vec::new())).is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_read_snapshot_missing_file() {
        assert!(read_snapshot(Utf8Path::new("/definitely/not/here.csv")).is_err());
    }
}
