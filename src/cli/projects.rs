use std::io::{self, Write};

use anyhow::Result;

use crate::{
    storage::{entities::Project, project_store::ProjectStore},
    utils::{percentage::progress, time::format_clock},
};

pub fn process_projects_command(store: &impl ProjectStore, json: bool) -> Result<()> {
    let projects = store.list_projects()?;
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &projects)?;
        writeln!(out)?;
        Ok(())
    } else {
        write_table(&mut out, &projects)
    }
}

fn write_table(out: &mut impl Write, projects: &[Project]) -> Result<()> {
    if projects.is_empty() {
        writeln!(out, "No projects")?;
        return Ok(());
    }
    let name_width = projects
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or_default();
    for project in projects {
        writeln!(
            out,
            "{:>4}  {:<name_width$}  {} / {}  {:>4}{}",
            project.id.0,
            project.name,
            format_clock(project.elapsed),
            format_clock(project.max_time),
            progress(project.elapsed, project.max_time).to_string(),
            if project.running { "  running" } else { "" },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;

    use super::write_table;
    use crate::storage::entities::{Project, ProjectId};

    #[test]
    fn test_table_output() -> Result<()> {
        let projects = vec![
            Project {
                id: ProjectId(1),
                name: "Write".into(),
                max_time: Duration::from_secs(25 * 60),
                running: true,
                elapsed: Duration::from_secs(5 * 60),
            },
            Project {
                id: ProjectId(2),
                name: "Read".into(),
                max_time: Duration::from_secs(600),
                running: false,
                elapsed: Duration::ZERO,
            },
        ];
        let mut out = vec![];
        write_table(&mut out, &projects)?;
        let text = String::from_utf8(out)?;
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "   1  Write  00:05:00 / 00:25:00   20%  running");
        assert_eq!(lines[1], "   2  Read   00:00:00 / 00:10:00    0%");
        Ok(())
    }
}
