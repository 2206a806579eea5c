use crate::model::{FullStudentProfile, Subject};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "records.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("create workspace {}", workspace.display()))?;
    let conn = Connection::open(workspace.join(DB_FILE_NAME))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS batches(
            name TEXT PRIMARY KEY
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            batch TEXT NOT NULL,
            department TEXT NOT NULL,
            id TEXT NOT NULL,
            enrollment_no TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            PRIMARY KEY(batch, department, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_roster_sort
         ON students(batch, department, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            department TEXT NOT NULL,
            semester INTEGER NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY(department, semester)
        )",
        [],
    )?;
    Ok(())
}

/// Roster and subject-list persistence. Implementations never open their own
/// transaction; callers group writes with `write_tx`.
pub trait RosterStore {
    fn fetch_roster(&self, batch: &str, department: &str)
        -> anyhow::Result<Vec<FullStudentProfile>>;
    fn fetch_subjects(&self, department: &str, semester: u8) -> anyhow::Result<Vec<Subject>>;
    /// Replaces the whole batch+department roster, keeping list order.
    fn persist_roster(
        &self,
        batch: &str,
        department: &str,
        students: &[FullStudentProfile],
    ) -> anyhow::Result<()>;
    fn persist_subjects(
        &self,
        department: &str,
        semester: u8,
        subjects: &[Subject],
    ) -> anyhow::Result<()>;
    /// Batches holding at least one student of `department`.
    fn roster_batches(&self, department: &str) -> anyhow::Result<Vec<String>>;
}

impl RosterStore for Connection {
    fn fetch_roster(
        &self,
        batch: &str,
        department: &str,
    ) -> anyhow::Result<Vec<FullStudentProfile>> {
        let mut stmt = self.prepare(
            "SELECT id, data FROM students
             WHERE batch = ? AND department = ?
             ORDER BY sort_order, rowid",
        )?;
        let rows = stmt
            .query_map((batch, department), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // A row that fails to decode fails the whole load; the next persist
        // would otherwise drop that student.
        rows
            .into_iter()
            .map(|(id, data)| {
                serde_json::from_str::<FullStudentProfile>(&data).with_context(|| {
                    format!("decode student {id} in {batch}/{department}")
                })
            })
            .collect()
    }

    fn fetch_subjects(&self, department: &str, semester: u8) -> anyhow::Result<Vec<Subject>> {
        let data: Option<String> = self
            .query_row(
                "SELECT data FROM subjects WHERE department = ? AND semester = ?",
                (department, semester as i64),
                |r| r.get(0),
            )
            .optional()?;
        let Some(data) = data else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&data)
            .with_context(|| format!("decode subjects for {department} semester {semester}"))
    }

    fn persist_roster(
        &self,
        batch: &str,
        department: &str,
        students: &[FullStudentProfile],
    ) -> anyhow::Result<()> {
        self.execute("INSERT OR IGNORE INTO batches(name) VALUES(?)", [batch])?;
        self.execute(
            "DELETE FROM students WHERE batch = ? AND department = ?",
            (batch, department),
        )?;
        let mut stmt = self.prepare(
            "INSERT INTO students(batch, department, id, enrollment_no, name, sort_order, data)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (i, s) in students.iter().enumerate() {
            let data = serde_json::to_string(s)?;
            stmt.execute((
                batch,
                department,
                &s.id,
                &s.enrollment_no,
                &s.name,
                i as i64,
                &data,
            ))
            .with_context(|| format!("insert student {}", s.id))?;
        }
        Ok(())
    }

    fn persist_subjects(
        &self,
        department: &str,
        semester: u8,
        subjects: &[Subject],
    ) -> anyhow::Result<()> {
        let data = serde_json::to_string(subjects)?;
        self.execute(
            "INSERT INTO subjects(department, semester, data) VALUES(?, ?, ?)
             ON CONFLICT(department, semester) DO UPDATE SET data = excluded.data",
            (department, semester as i64, &data),
        )?;
        Ok(())
    }

    fn roster_batches(&self, department: &str) -> anyhow::Result<Vec<String>> {
        let mut stmt = self.prepare(
            "SELECT DISTINCT batch FROM students WHERE department = ? ORDER BY batch",
        )?;
        let batches = stmt
            .query_map([department], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }
}

/// Runs `f` inside one transaction; nothing is written unless `f` succeeds.
pub fn write_tx<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<anyhow::Error>,
{
    let tx = conn
        .unchecked_transaction()
        .context("begin transaction")
        .map_err(E::from)?;
    let out = f(&tx)?;
    tx.commit().context("commit transaction").map_err(E::from)?;
    Ok(out)
}

pub fn list_batches(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM batches ORDER BY name")?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

pub fn batch_exists(conn: &Connection, name: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM batches WHERE name = ?", [name], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn create_batch(conn: &Connection, name: &str) -> anyhow::Result<()> {
    conn.execute("INSERT INTO batches(name) VALUES(?)", [name])?;
    Ok(())
}

pub fn rename_batch(conn: &Connection, old: &str, new: &str) -> anyhow::Result<()> {
    conn.execute("UPDATE batches SET name = ? WHERE name = ?", (new, old))?;
    conn.execute("UPDATE students SET batch = ? WHERE batch = ?", (new, old))?;
    Ok(())
}

pub fn batch_student_count(conn: &Connection, name: &str) -> anyhow::Result<i64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE batch = ?",
        [name],
        |r| r.get(0),
    )?;
    Ok(n)
}

pub fn delete_batch(conn: &Connection, name: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM students WHERE batch = ?", [name])?;
    conn.execute("DELETE FROM batches WHERE name = ?", [name])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("schema");
        conn
    }

    fn profile(id: &str) -> FullStudentProfile {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("Student {id}"),
            "enrollmentNo": id,
            "academicHistory": { "1": [ { "subjectName": "Maths", "theoryQuiz": 7 } ] }
        }))
        .expect("profile")
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = memory_db();
        write_tx(&conn, |tx| tx.persist_roster("2023-2027", "cse", &[profile("E1")]))
            .expect("persist");
        init_schema(&conn).expect("second init");
        assert_eq!(conn.fetch_roster("2023-2027", "cse").expect("fetch").len(), 1);
    }

    #[test]
    fn undecodable_student_row_fails_the_load() {
        let conn = memory_db();
        let roster = vec![profile("E1"), profile("E2")];
        write_tx(&conn, |tx| tx.persist_roster("2023-2027", "cse", &roster)).expect("persist");
        conn.execute(
            "UPDATE students SET data = '{\"id\": 7}' WHERE id = 'E2'",
            [],
        )
        .expect("corrupt row");

        let err = conn
            .fetch_roster("2023-2027", "cse")
            .expect_err("corrupt row must not be skipped");
        assert!(format!("{err:#}").contains("decode student E2"));
        assert_eq!(batch_student_count(&conn, "2023-2027").expect("count"), 2);
    }

    #[test]
    fn roster_round_trips_in_order() {
        let conn = memory_db();
        let roster = vec![profile("E2"), profile("E1")];
        write_tx(&conn, |tx| tx.persist_roster("2023-2027", "cse", &roster)).expect("persist");

        let back = conn.fetch_roster("2023-2027", "cse").expect("fetch");
        assert_eq!(back, roster);
        assert!(conn.fetch_roster("2023-2027", "ece").expect("other").is_empty());
        assert_eq!(list_batches(&conn).expect("batches"), vec!["2023-2027"]);
        assert_eq!(conn.roster_batches("cse").expect("rb"), vec!["2023-2027"]);

        write_tx(&conn, |tx| tx.persist_roster("2023-2027", "cse", &roster[..1])).expect("shrink");
        assert_eq!(conn.fetch_roster("2023-2027", "cse").expect("fetch").len(), 1);
    }

    #[test]
    fn failed_write_rolls_back() {
        let conn = memory_db();
        let roster = vec![profile("E1")];
        let res: anyhow::Result<()> = write_tx(&conn, |tx| {
            tx.persist_roster("2024-2028", "cse", &roster)?;
            anyhow::bail!("boom")
        });
        assert!(res.is_err());
        assert!(conn.fetch_roster("2024-2028", "cse").expect("fetch").is_empty());
        assert!(!batch_exists(&conn, "2024-2028").expect("exists"));
    }

    #[test]
    fn subjects_upsert_per_department_and_semester() {
        let conn = memory_db();
        assert!(conn.fetch_subjects("cse", 1).expect("empty").is_empty());
        let list = vec![Subject {
            name: "Maths".into(),
            code: "MA101".into(),
            category: "Core".into(),
        }];
        conn.persist_subjects("cse", 1, &list).expect("save");
        conn.persist_subjects("cse", 1, &list).expect("save again");
        assert_eq!(conn.fetch_subjects("cse", 1).expect("load"), list);
        assert!(conn.fetch_subjects("cse", 2).expect("other sem").is_empty());
    }

    #[test]
    fn batch_rename_moves_students() {
        let conn = memory_db();
        create_batch(&conn, "2022-2026").expect("create");
        write_tx(&conn, |tx| tx.persist_roster("2022-2026", "mech", &[profile("E9")]))
            .expect("persist");
        assert_eq!(batch_student_count(&conn, "2022-2026").expect("count"), 1);

        rename_batch(&conn, "2022-2026", "2022-26").expect("rename");
        assert_eq!(list_batches(&conn).expect("list"), vec!["2022-26"]);
        assert_eq!(conn.fetch_roster("2022-26", "mech").expect("fetch").len(), 1);

        delete_batch(&conn, "2022-26").expect("delete");
        assert!(list_batches(&conn).expect("list").is_empty());
        assert_eq!(batch_student_count(&conn, "2022-26").expect("count"), 0);
    }
}
