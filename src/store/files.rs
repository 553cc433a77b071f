use crate::error::{PortalError, Result};
use crate::media::{public_id_for, MediaHost};
use crate::model::FileRecord;
use crate::store::required_text;
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct NewFile {
    pub title: String,
    pub subject: String,
    pub semester: String,
    pub file_name: String,
}

pub struct UploadLimits<'a> {
    pub folder: &'a str,
    pub max_bytes: u64,
}

const SELECT_FILE: &str = "SELECT id, title, subject, semester, file_name, file_path, media_id, file_size, uploaded_at
     FROM files";

fn file_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: r.get(0)?,
        title: r.get(1)?,
        subject: r.get(2)?,
        semester: r.get(3)?,
        file_name: r.get(4)?,
        file_path: r.get(5)?,
        media_id: r.get(6)?,
        file_size: r.get(7)?,
        uploaded_at: r.get(8)?,
    })
}

pub fn list(
    conn: &Connection,
    subject: Option<&str>,
    semester: Option<&str>,
) -> Result<Vec<FileRecord>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<&dyn ToSql> = Vec::new();
    if let Some(ref s) = subject {
        clauses.push("subject = ?");
        binds.push(s as &dyn ToSql);
    }
    if let Some(ref s) = semester {
        clauses.push("semester = ?");
        binds.push(s as &dyn ToSql);
    }
    let mut sql = SELECT_FILE.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY uploaded_at DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), file_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: i64) -> Result<FileRecord> {
    conn.query_row(&format!("{SELECT_FILE} WHERE id = ?"), [id], file_from_row)
        .optional()?
        .ok_or(PortalError::NotFound("file"))
}

/// Pushes the bytes to the media host, then records the file. A failed upload
/// leaves no record behind.
pub fn upload(
    conn: &Connection,
    media: &dyn MediaHost,
    limits: &UploadLimits<'_>,
    new: NewFile,
    bytes: &[u8],
) -> Result<FileRecord> {
    let title = required_text("title", &new.title)?;
    let subject = required_text("subject", &new.subject)?;
    let semester = required_text("semester", &new.semester)?;
    let file_name = required_text("fileName", &new.file_name)?;
    if bytes.is_empty() {
        return Err(PortalError::bad_params("file is empty"));
    }
    if bytes.len() as u64 > limits.max_bytes {
        return Err(PortalError::bad_params(format!(
            "file is {} bytes, limit is {}",
            bytes.len(),
            limits.max_bytes
        )));
    }

    let uploaded_at = Utc::now();
    let public_id = public_id_for(&file_name, uploaded_at.timestamp_millis());
    info!(file_name = %file_name, size = bytes.len(), backend = media.backend(), "uploading file");
    let stored = media.upload(limits.folder, &public_id, bytes)?;

    let inserted = conn.execute(
        "INSERT INTO files(title, subject, semester, file_name, file_path, media_id, file_size, uploaded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &title,
            &subject,
            &semester,
            &file_name,
            &stored.url,
            &stored.media_id,
            bytes.len() as i64,
            uploaded_at,
        ),
    );
    if let Err(e) = inserted {
        if let Err(cleanup) = media.destroy(&stored.media_id) {
            warn!(media_id = %stored.media_id, error = %cleanup, "orphaned media after failed insert");
        }
        return Err(e.into());
    }

    let record = get(conn, conn.last_insert_rowid())?;
    info!(id = record.id, url = %record.file_path, "file saved");
    Ok(record)
}

/// Removes the record; media deletion is best-effort.
pub fn delete(conn: &Connection, media: &dyn MediaHost, id: i64) -> Result<FileRecord> {
    let record = get(conn, id)?;
    conn.execute("DELETE FROM files WHERE id = ?", [id])?;
    if let Err(e) = media.destroy(&record.media_id) {
        warn!(id, media_id = %record.media_id, error = %e, "failed to delete media");
    }
    Ok(record)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::media::{LocalMediaHost, UploadedMedia};
    use std::cell::RefCell;

    #[derive(Default)]
    pub(crate) struct RecordingHost {
        pub uploads: RefCell<Vec<String>>,
        pub destroyed: RefCell<Vec<String>>,
        pub fail_upload: bool,
        pub fail_destroy: bool,
    }

    impl MediaHost for RecordingHost {
        fn backend(&self) -> &'static str {
            "recording"
        }

        fn upload(&self, folder: &str, public_id: &str, _bytes: &[u8]) -> Result<UploadedMedia> {
            if self.fail_upload {
                return Err(PortalError::Media("boom".into()));
            }
            let media_id = format!("{folder}/{public_id}");
            self.uploads.borrow_mut().push(media_id.clone());
            Ok(UploadedMedia {
                url: format!("https://res.cloudinary.com/demo/raw/upload/v1/{media_id}"),
                media_id,
            })
        }

        fn destroy(&self, media_id: &str) -> Result<()> {
            if self.fail_destroy {
                return Err(PortalError::Media("unreachable".into()));
            }
            self.destroyed.borrow_mut().push(media_id.to_string());
            Ok(())
        }
    }

    const LIMITS: UploadLimits<'static> = UploadLimits {
        folder: "student-portal",
        max_bytes: 16,
    };

    fn new_file(subject: &str, semester: &str) -> NewFile {
        NewFile {
            title: "Week 1 notes".into(),
            subject: subject.into(),
            semester: semester.into(),
            file_name: "week 1.pdf".into(),
        }
    }

    #[test]
    fn upload_then_get_returns_same_record() {
        let conn = open_in_memory();
        let host = RecordingHost::default();
        let created = upload(&conn, &host, &LIMITS, new_file("math", "first"), b"pdf").expect("upload");
        assert_eq!(get(&conn, created.id).expect("get"), created);
        assert_eq!(created.file_size, 3);
        assert!(created.media_id.starts_with("student-portal/"));
        assert!(created.media_id.ends_with("-week_1.pdf"));
    }

    #[test]
    fn filters_combine_and_newest_comes_first() {
        let conn = open_in_memory();
        let host = RecordingHost::default();
        let a = upload(&conn, &host, &LIMITS, new_file("math", "first"), b"a").expect("a");
        let b = upload(&conn, &host, &LIMITS, new_file("math", "second"), b"b").expect("b");
        let c = upload(&conn, &host, &LIMITS, new_file("physics", "first"), b"c").expect("c");

        let all = list(&conn, None, None).expect("all");
        assert_eq!(all.iter().map(|f| f.id).collect::<Vec<_>>(), vec![c.id, b.id, a.id]);
        let math = list(&conn, Some("math"), None).expect("math");
        assert_eq!(math.len(), 2);
        let first = list(&conn, None, Some("first")).expect("first");
        assert_eq!(first.len(), 2);
        let both = list(&conn, Some("math"), Some("first")).expect("both");
        assert_eq!(both, vec![a]);
    }

    #[test]
    fn empty_and_oversized_files_are_rejected() {
        let conn = open_in_memory();
        let host = RecordingHost::default();
        let e = upload(&conn, &host, &LIMITS, new_file("math", "first"), b"").expect_err("empty");
        assert_eq!(e.code(), "bad_params");
        let big = vec![0u8; 17];
        let e = upload(&conn, &host, &LIMITS, new_file("math", "first"), &big).expect_err("big");
        assert_eq!(e.code(), "bad_params");
        assert!(host.uploads.borrow().is_empty());
    }

    #[test]
    fn failed_upload_creates_no_record() {
        let conn = open_in_memory();
        let host = RecordingHost {
            fail_upload: true,
            ..Default::default()
        };
        let e = upload(&conn, &host, &LIMITS, new_file("math", "first"), b"x").expect_err("fail");
        assert_eq!(e.code(), "media_failed");
        assert!(list(&conn, None, None).expect("list").is_empty());
    }

    #[test]
    fn delete_removes_record_even_when_media_delete_fails() {
        let conn = open_in_memory();
        let host = RecordingHost {
            fail_destroy: true,
            ..Default::default()
        };
        let created = upload(&conn, &host, &LIMITS, new_file("math", "first"), b"x").expect("upload");
        delete(&conn, &host, created.id).expect("delete");
        assert_eq!(get(&conn, created.id).expect_err("gone").code(), "not_found");
        assert_eq!(delete(&conn, &host, created.id).expect_err("again").code(), "not_found");
    }

    #[test]
    fn same_name_uploads_keep_separate_media() {
        let conn = open_in_memory();
        let dir = tempfile::tempdir().expect("tempdir");
        let host = LocalMediaHost::new(dir.path());
        let limits = UploadLimits {
            folder: "student-portal",
            max_bytes: 1024,
        };
        let records: Vec<FileRecord> = (0..50)
            .map(|i| {
                let mut new = new_file("math", "first");
                new.file_name = "notes.pdf".into();
                upload(&conn, &host, &limits, new, format!("copy {i}").as_bytes()).expect("upload")
            })
            .collect();
        let ids: std::collections::HashSet<_> = records.iter().map(|r| &r.media_id).collect();
        assert_eq!(ids.len(), records.len());

        delete(&conn, &host, records[0].id).expect("delete first");
        let second = &records[1];
        assert_eq!(get(&conn, second.id).expect("second kept"), *second);
        assert_eq!(
            std::fs::read(dir.path().join(&second.media_id)).expect("second media"),
            b"copy 1"
        );
    }

    #[test]
    fn delete_destroys_stored_media() {
        let conn = open_in_memory();
        let host = RecordingHost::default();
        let created = upload(&conn, &host, &LIMITS, new_file("math", "first"), b"x").expect("upload");
        delete(&conn, &host, created.id).expect("delete");
        assert_eq!(*host.destroyed.borrow(), vec![created.media_id]);
    }
}
