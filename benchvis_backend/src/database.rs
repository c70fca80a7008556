use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

pub const STATUS_IN_PROGRESS: &str = "em andamento";

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub quantity: i64,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeVersion {
    pub id: i64,
    pub project_id: i64,
    pub version: i64,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: i64,
    pub project_id: i64,
    pub order: i64,
    pub description: String,
    pub done: bool,
}

/// Row counts owned by one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildCounts {
    pub components: usize,
    pub code_versions: usize,
    pub steps: usize,
}

impl ChildCounts {
    pub fn total(&self) -> usize {
        self.components + self.code_versions + self.steps
    }
}

/// SQLite-backed project store. Owned children go away with their project
/// through `ON DELETE CASCADE`.
pub struct ProjectDatabase {
    conn: Mutex<Connection>,
}

fn timestamp_now() -> String {
    // Fixed-width so lexical order matches time order
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl ProjectDatabase {
    /// Helper to lock the connection
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Database lock poisoned: {}", e))
    }

    /// Create or open the database
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database {:?}", path.as_ref()))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Cascades are off by default in SQLite
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    /// Create the database schema
    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                status TEXT NOT NULL,
                language TEXT NOT NULL DEFAULT 'arduino'
            )"#,
            [],
        )?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                note TEXT NOT NULL DEFAULT ''
            )"#,
            [],
        )?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS code_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                version INTEGER NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL,
                language TEXT NOT NULL
            )"#,
            [],
        )?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS steps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                step_order INTEGER NOT NULL,
                description TEXT NOT NULL,
                done INTEGER NOT NULL DEFAULT 0
            )"#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_projects_created_at ON projects(created_at DESC)",
            [],
        )?;

        Ok(())
    }

    /// Inserts a project in status "em andamento". Store errors are logged and
    /// reported as `None`.
    pub fn create_project(&self, name: &str, description: &str, language: &str) -> Option<i64> {
        match self.insert_project(name, description, language) {
            Ok(id) => {
                tracing::info!("Created project {} ({})", id, name);
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Failed to create project '{}': {:#}", name, e);
                None
            }
        }
    }

    fn insert_project(&self, name: &str, description: &str, language: &str) -> Result<i64> {
        if name.trim().is_empty() {
            anyhow::bail!("project name is empty");
        }
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO projects (name, description, created_at, status, language)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                description,
                timestamp_now(),
                STATUS_IN_PROGRESS,
                language
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All projects, most recent first
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, created_at, status, language
             FROM projects
             ORDER BY created_at DESC, id DESC",
        )?;

        let projects = stmt
            .query_map([], |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at: parse_timestamp(3, row.get(3)?)?,
                    status: row.get(4)?,
                    language: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let conn = self.lock_conn()?;
        let project = conn
            .query_row(
                "SELECT id, name, description, created_at, status, language
                 FROM projects WHERE id = ?1",
                [id],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_at: parse_timestamp(3, row.get(3)?)?,
                        status: row.get(4)?,
                        language: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(project)
    }

    /// Removes a project and, by cascade, everything it owns. Returns whether a
    /// row existed; store errors count as "not removed".
    pub fn delete_project(&self, id: i64) -> bool {
        let result = self
            .lock_conn()
            .and_then(|conn| Ok(conn.execute("DELETE FROM projects WHERE id = ?1", [id])?));
        match result {
            Ok(removed) => {
                tracing::info!("Delete project {}: {} row(s) removed", id, removed);
                removed > 0
            }
            Err(e) => {
                tracing::warn!("Failed to delete project {}: {:#}", id, e);
                false
            }
        }
    }

    /// Components of a project, in store order
    pub fn list_components(&self, project_id: i64) -> Result<Vec<Component>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, project_id, name, quantity, note
             FROM components
             WHERE project_id = ?1",
        )?;

        let components = stmt
            .query_map([project_id], |row| {
                Ok(Component {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    name: row.get(2)?,
                    quantity: row.get(3)?,
                    note: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(components)
    }

    pub fn add_component(
        &self,
        project_id: i64,
        name: &str,
        quantity: i64,
        note: &str,
    ) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO components (project_id, name, quantity, note) VALUES (?1, ?2, ?3, ?4)",
            params![project_id, name, quantity, note],
        )
        .with_context(|| format!("Failed to add component to project {}", project_id))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_step(&self, project_id: i64, order: i64, description: &str) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO steps (project_id, step_order, description, done) VALUES (?1, ?2, ?3, 0)",
            params![project_id, order, description],
        )
        .with_context(|| format!("Failed to add step to project {}", project_id))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_steps(&self, project_id: i64) -> Result<Vec<Step>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, project_id, step_order, description, done
             FROM steps
             WHERE project_id = ?1
             ORDER BY step_order ASC",
        )?;

        let steps = stmt
            .query_map([project_id], |row| {
                Ok(Step {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    order: row.get(2)?,
                    description: row.get(3)?,
                    done: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(steps)
    }

    /// Stores `source` as the next version number of the project's code.
    pub fn add_code_version(&self, project_id: i64, source: &str, language: &str) -> Result<i64> {
        let conn = self.lock_conn()?;
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM code_versions WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO code_versions (project_id, version, source, created_at, language)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![project_id, next, source, timestamp_now(), language],
        )
        .with_context(|| format!("Failed to save code for project {}", project_id))?;
        Ok(next)
    }

    pub fn list_code_versions(&self, project_id: i64) -> Result<Vec<CodeVersion>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, project_id, version, source, created_at, language
             FROM code_versions
             WHERE project_id = ?1
             ORDER BY version ASC",
        )?;

        let versions = stmt
            .query_map([project_id], |row| {
                Ok(CodeVersion {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    version: row.get(2)?,
                    source: row.get(3)?,
                    created_at: parse_timestamp(4, row.get(4)?)?,
                    language: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    pub fn count_children(&self, project_id: i64) -> Result<ChildCounts> {
        let conn = self.lock_conn()?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE project_id = ?1", table),
                [project_id],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };
        Ok(ChildCounts {
            components: count("components")?,
            code_versions: count("code_versions")?,
            steps: count("steps")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (tempfile::TempDir, ProjectDatabase) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = ProjectDatabase::new(dir.path().join("benchvis.db")).expect("db init");
        (dir, db)
    }

    #[test]
    fn create_assigns_fresh_id_and_in_progress_status() {
        let (_dir, db) = temp_db();
        let id = db
            .create_project("Fonte 5V", "", "arduino")
            .expect("create project");

        let project = db.get_project(id).expect("get").expect("exists");
        assert_eq!(project.name, "Fonte 5V");
        assert_eq!(project.status, STATUS_IN_PROGRESS);
        assert_eq!(project.language, "arduino");

        let second = db.create_project("Amplificador", "classe D", "arduino");
        assert!(second.is_some_and(|other| other != id));
    }

    #[test]
    fn create_with_blank_name_reports_failure() {
        let (_dir, db) = temp_db();
        assert!(db.create_project("   ", "", "arduino").is_none());
        assert!(db.list_projects().expect("list").is_empty());
    }

    #[test]
    fn list_returns_most_recent_first() {
        let (_dir, db) = temp_db();
        let first = db.create_project("Primeiro", "", "arduino").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = db.create_project("Segundo", "", "python").unwrap();

        let projects = db.list_projects().expect("list");
        let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn delete_cascades_to_every_child_table() {
        let (_dir, db) = temp_db();
        let id = db.create_project("Estação de solda", "", "arduino").unwrap();
        let keep = db.create_project("Outro", "", "arduino").unwrap();

        db.add_component(id, "LM7805", 1, "regulador").unwrap();
        db.add_component(id, "Capacitor 100uF", 2, "").unwrap();
        db.add_component(keep, "LED", 3, "").unwrap();
        db.add_code_version(id, "void setup() {}", "arduino").unwrap();
        db.add_code_version(id, "void loop() {}", "arduino").unwrap();
        db.add_step(id, 1, "Montar a fonte").unwrap();
        db.add_step(id, 2, "Testar com carga").unwrap();
        db.add_step(id, 3, "Fechar a caixa").unwrap();

        let before = db.count_children(id).unwrap();
        assert_eq!(before.total(), 2 + 2 + 3);

        assert!(db.delete_project(id));
        assert!(db.get_project(id).unwrap().is_none());
        assert_eq!(db.count_children(id).unwrap(), ChildCounts::default());

        // Siblings survive
        assert_eq!(db.list_components(keep).unwrap().len(), 1);
    }

    #[test]
    fn deleting_unknown_id_reports_not_found() {
        let (_dir, db) = temp_db();
        db.create_project("Fonte", "", "arduino").unwrap();
        assert!(!db.delete_project(999));
        assert_eq!(db.list_projects().unwrap().len(), 1);
    }

    #[test]
    fn children_cannot_reference_missing_project() {
        let (_dir, db) = temp_db();
        assert!(db.add_component(42, "Resistor", 1, "").is_err());
        assert!(db.add_step(42, 1, "nada").is_err());
    }

    #[test]
    fn code_versions_increment_per_project() {
        let db = ProjectDatabase::in_memory().expect("in-memory db");
        let a = db.create_project("A", "", "arduino").unwrap();
        let b = db.create_project("B", "", "python").unwrap();

        assert_eq!(db.add_code_version(a, "v1", "arduino").unwrap(), 1);
        assert_eq!(db.add_code_version(a, "v2", "arduino").unwrap(), 2);
        assert_eq!(db.add_code_version(b, "print()", "python").unwrap(), 1);

        let versions = db.list_code_versions(a).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].source, "v2");
    }

    #[test]
    fn steps_come_back_in_order_and_not_done() {
        let db = ProjectDatabase::in_memory().expect("in-memory db");
        let id = db.create_project("Relógio", "", "arduino").unwrap();
        db.add_step(id, 2, "Soldar").unwrap();
        db.add_step(id, 1, "Comprar peças").unwrap();

        let steps = db.list_steps(id).unwrap();
        assert_eq!(steps[0].description, "Comprar peças");
        assert!(steps.iter().all(|s| !s.done));
    }
}
