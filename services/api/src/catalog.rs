use academy_intake::config::AppConfig;
use academy_intake::error::AppError;
use academy_intake::records::Course;
use academy_intake::store::{CourseStore, SqliteStore};
use academy_intake::workflows::certificates::import_certificates;
use academy_intake::workflows::courses::import_courses;
use clap::Args;
use std::fmt::Write as _;
use std::fs::File;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct CsvImportArgs {
    /// CSV file to load; the first line holds the column names
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

fn open_store(config: &AppConfig) -> Result<SqliteStore, AppError> {
    Ok(SqliteStore::open(&config.database.path)?)
}

pub(crate) fn run_course_import(args: CsvImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = open_store(&config)?;
    let file = File::open(&args.csv)?;
    let summary = import_courses(&store, file)?;

    println!(
        "Imported {} course(s) from {} into {}",
        summary.imported,
        args.csv.display(),
        config.database.path.display()
    );
    Ok(())
}

pub(crate) fn run_certificate_import(args: CsvImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = open_store(&config)?;
    let file = File::open(&args.csv)?;
    let summary = import_certificates(&store, file)?;

    println!(
        "Imported {} certificate(s) from {}",
        summary.imported,
        args.csv.display()
    );
    Ok(())
}

pub(crate) fn run_course_list() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = open_store(&config)?;
    let courses = store.courses()?;
    print!("{}", render_courses(&courses));
    Ok(())
}

fn render_courses(courses: &[Course]) -> String {
    if courses.is_empty() {
        return "No courses loaded. Run `courses import --csv <path>` first.\n".to_string();
    }

    let width = courses
        .iter()
        .map(|course| course.shortname.len())
        .max()
        .unwrap_or(0)
        .max("shortname".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:>6}  {:<width$}  name", "id", "shortname");
    for course in courses {
        let _ = writeln!(
            out,
            "{:>6}  {:<width$}  {}",
            course.id.0, course.shortname, course.name
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_intake::records::CourseId;

    #[test]
    fn renders_an_aligned_table() {
        let courses = vec![
            Course {
                id: CourseId(7),
                shortname: "cbpea".to_string(),
                name: "Curso básico".to_string(),
            },
            Course {
                id: CourseId(12),
                shortname: "avz".to_string(),
                name: "Curso avanzado".to_string(),
            },
        ];

        let table = render_courses(&courses);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "    id  shortname  name");
        assert_eq!(lines[1], "     7  cbpea      Curso básico");
        assert_eq!(lines[2], "    12  avz        Curso avanzado");
    }

    #[test]
    fn empty_catalog_points_at_import() {
        assert!(render_courses(&[]).contains("courses import"));
    }
}
