use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use tvc_root::{Roots, Table};
use tvc_stage::{RootsStatus, StatusEntry};
use tvc_tuple::{Close, TupleRead, TupleReader, TupleWrite, TupleWriter, Value};
use tvc_types::TableName;

use crate::cli::*;
use crate::repo::Repo;

/// Dispatch a parsed command.
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let repo = cli.repo.as_path();
    match cli.command {
        Command::Init(args) => cmd_init(repo, args),
        Command::Status(args) => cmd_status(repo, args),
        Command::Add(args) => cmd_add(repo, args),
        Command::Reset(args) => cmd_reset(repo, args),
        Command::Table(args) => cmd_table(repo, args.action),
        Command::Tuples(args) => cmd_tuples(repo, args.action),
    }
}

fn cmd_init(path: &Path, args: InitArgs) -> anyhow::Result<()> {
    let repo = Repo::init(path, args.collation)?;
    println!(
        "{} Initialized tvc repository in {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    println!("  Collation: {}", repo.config().database.default_collation.to_string().cyan());
    Ok(())
}

fn cmd_status(path: &Path, args: StatusArgs) -> anyhow::Result<()> {
    let repo = Repo::open(path)?;
    let status = repo.stager().status(&repo.load_roots()?)?;
    print_status(&status, args.ignored);
    Ok(())
}

fn print_status(status: &RootsStatus, show_ignored: bool) {
    if status.is_clean() {
        println!("nothing to commit, working set clean");
    }
    if !status.staged.is_empty() {
        println!("Changes to be committed:");
        for entry in &status.staged {
            println!("  {}", format_entry(entry).green());
        }
    }
    if !status.unstaged.is_empty() || status.collation_drift.is_some() {
        println!("Changes not staged for commit:");
        for entry in &status.unstaged {
            println!("  {}", format_entry(entry).red());
        }
        if let Some((staged, working)) = status.collation_drift {
            println!("  {}", format!("collation: {staged} -> {working}").red());
        }
    }
    if !status.untracked.is_empty() {
        println!("Untracked tables:");
        for name in &status.untracked {
            println!("  {}", format!("new table: {name}").red());
        }
    }
    if !status.conflicts.is_empty() {
        println!("Unmerged tables:");
        for name in &status.conflicts {
            println!("  {}", format!("both modified: {name}").yellow());
        }
    }
    if show_ignored && !status.ignored.is_empty() {
        println!("Ignored tables:");
        for name in &status.ignored {
            println!("  {}", name.to_string().dimmed());
        }
    }
}

fn format_entry(entry: &StatusEntry) -> String {
    format!("{:>12}  {}", format!("{}:", entry.status), entry.name)
}

fn cmd_add(path: &Path, args: AddArgs) -> anyhow::Result<()> {
    let repo = Repo::open(path)?;
    let stager = repo.stager();
    let roots = repo.load_roots()?;
    let filter_ignored = !args.force;

    let mut next = if args.all {
        stager.stage_all_tables(&roots, filter_ignored)?
    } else if args.update {
        stager.stage_modified_and_deleted_tables(&roots)?
    } else if args.tables.is_empty() {
        bail!("Nothing specified, nothing added. Maybe you wanted to say 'tvc add -A'?");
    } else {
        stager.stage_tables(&roots, &args.tables, filter_ignored)?
    };
    if next.working.collation() != next.staged.collation() {
        next = stager.stage_database(&next, filter_ignored)?;
    }

    repo.save_roots(&next)?;
    for name in changed_tables(&roots.staged, &next.staged) {
        println!("  {} {}", "staged:".green(), name);
    }
    if roots.staged.collation() != next.staged.collation() {
        println!("  {} collation {}", "staged:".green(), next.staged.collation());
    }
    Ok(())
}

fn cmd_reset(path: &Path, args: ResetArgs) -> anyhow::Result<()> {
    let repo = Repo::open(path)?;
    let stager = repo.stager();
    let roots = repo.load_roots()?;

    let next = if args.tables.is_empty() {
        stager.unstage_all_tables(&roots)?
    } else {
        stager.unstage_tables(&roots, &args.tables)?
    };
    repo.save_roots(&next)?;
    for name in changed_tables(&roots.staged, &next.staged) {
        println!("  {} {}", "unstaged:".yellow(), name);
    }
    Ok(())
}

/// Names whose table differs between `before` and `after`.
fn changed_tables(before: &tvc_root::RootValue, after: &tvc_root::RootValue) -> Vec<TableName> {
    tvc_stage::union_table_names(&[before, after])
        .into_iter()
        .filter(|name| before.get_table(name) != after.get_table(name))
        .collect()
}

fn cmd_table(path: &Path, action: TableAction) -> anyhow::Result<()> {
    let repo = Repo::open(path)?;
    let roots = repo.load_roots()?;
    match action {
        TableAction::Create { name, columns } => {
            if roots.working.has_table(&name) {
                bail!("table {name} already exists");
            }
            let table = Table::new(tvc_root::Schema::new(columns)?);
            println!(
                "{} Created table {} {}",
                "✓".green().bold(),
                name.to_string().bold(),
                table.schema()
            );
            save_working(&repo, &roots, roots.working.put_table(name, table)?)
        }
        TableAction::Put { name, values } => {
            let table = roots.working.require_table(&name)?;
            let values = parse_row(table, &values)?;
            let table = table.put_values(&name.to_string(), &values)?;
            println!("{} {} now has {} row(s)", "✓".green().bold(), name, table.row_count());
            save_working(&repo, &roots, roots.working.put_table(name, table)?)
        }
        TableAction::Drop { name } => {
            roots.working.require_table(&name)?;
            println!("{} Dropped table {}", "✓".green().bold(), name);
            save_working(&repo, &roots, roots.working.remove_table(&name))
        }
        TableAction::Export { name, output, staged } => {
            let root = if staged { &roots.staged } else { &roots.working };
            let table = root.require_table(&name)?;
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let mut writer = TupleWriter::new(BufWriter::new(file));
            for (key, value) in table.rows() {
                writer.write_tuple(key)?;
                writer.write_tuple(value)?;
            }
            writer.close()?;
            println!(
                "{} Exported {} row(s) of {} to {}",
                "✓".green().bold(),
                table.row_count(),
                name,
                output.display()
            );
            Ok(())
        }
    }
}

fn save_working(repo: &Repo, roots: &Roots, working: tvc_root::RootValue) -> anyhow::Result<()> {
    repo.save_roots(&roots.with_working(working))?;
    Ok(())
}

/// Parse one raw string per column, in schema order.
fn parse_row(table: &Table, raw: &[String]) -> anyhow::Result<Vec<Value>> {
    let columns = table.schema().columns();
    if raw.len() != columns.len() {
        bail!("expected {} value(s) for {}, got {}", columns.len(), table.schema(), raw.len());
    }
    columns
        .iter()
        .zip(raw)
        .map(|(column, raw)| {
            column
                .column_type
                .parse_value(raw)
                .map_err(|reason| anyhow::anyhow!("column {}: {reason}", column.name))
        })
        .collect()
}

fn cmd_tuples(path: &Path, action: TuplesAction) -> anyhow::Result<()> {
    match action {
        TuplesAction::Dump { input } => {
            let mut reader = open_stream(path, &input)?;
            let mut index = 0u64;
            while let Some(tuple) = reader.read_tuple()? {
                let rendered = match tuple.values() {
                    Ok(values) => render_values(&values),
                    Err(_) => format!("<{} raw bytes>", tuple.len()),
                };
                println!("{:>6}  {}", index.to_string().dimmed(), rendered);
                index += 1;
            }
            println!("{} tuple(s), {} bytes", index, reader.offset());
            Ok(())
        }
        TuplesAction::Copy { input, output } => {
            let mut reader = open_stream(path, &input)?;
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let mut writer = TupleWriter::new(BufWriter::new(file));
            let copied = writer.copy_from(&mut reader)?;
            writer.close()?;
            println!("{} Copied {} tuple(s) to {}", "✓".green().bold(), copied, output.display());
            Ok(())
        }
    }
}

/// Open a stream file, resolving references through the repository store
/// when `repo` is one.
fn open_stream(repo: &Path, input: &Path) -> anyhow::Result<TupleReader<BufReader<File>>> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let source = BufReader::new(file);
    Ok(match Repo::open(repo) {
        Ok(repo) => TupleReader::new(source, repo.store()),
        Err(_) => TupleReader::detached(source),
    })
}

fn render_values(values: &[Value]) -> String {
    let fields: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("({})", fields.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvc_types::Collation;

    fn table_name(n: &str) -> TableName {
        TableName::new(n)
    }

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path(), InitArgs { collation: None }).unwrap();
        for name in ["users", "tmp_scratch"] {
            cmd_table(
                dir.path(),
                TableAction::Create {
                    name: table_name(name),
                    columns: vec!["id:int:pk".parse().unwrap(), "name:string".parse().unwrap()],
                },
            )
            .unwrap();
            cmd_table(
                dir.path(),
                TableAction::Put {
                    name: table_name(name),
                    values: vec!["1".into(), "ann".into()],
                },
            )
            .unwrap();
        }
        dir
    }

    fn roots(dir: &tempfile::TempDir) -> Roots {
        Repo::open(dir.path()).unwrap().load_roots().unwrap()
    }

    fn add(dir: &tempfile::TempDir, tables: &[&str], all: bool, force: bool) -> anyhow::Result<()> {
        cmd_add(
            dir.path(),
            AddArgs {
                tables: tables.iter().map(|n| table_name(n)).collect(),
                all,
                update: false,
                force,
            },
        )
    }

    #[test]
    fn add_named_table() {
        let dir = setup();
        add(&dir, &["users"], false, false).unwrap();
        let r = roots(&dir);
        assert_eq!(r.staged.table_names(), vec![table_name("users")]);
        assert_eq!(r.staged.get_table(&table_name("users")).unwrap().row_count(), 1);
    }

    #[test]
    fn add_missing_table_fails_without_changes() {
        let dir = setup();
        let before = roots(&dir);
        let err = add(&dir, &["nope"], false, false).unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert_eq!(roots(&dir), before);
    }

    #[test]
    fn add_without_tables_is_an_error() {
        let dir = setup();
        assert!(add(&dir, &[], false, false).is_err());
    }

    #[test]
    fn add_all_honors_config_ignore_rules() {
        let dir = setup();
        let config_path = dir.path().join(".tvc/config.toml");
        let mut config = crate::config::RepoConfig::load(&config_path).unwrap();
        config.ignore.push(tvc_stage::IgnorePattern::ignore("tmp_*"));
        config.save(&config_path).unwrap();

        add(&dir, &[], true, false).unwrap();
        assert_eq!(roots(&dir).staged.table_names(), vec![table_name("users")]);

        add(&dir, &[], true, true).unwrap();
        assert_eq!(roots(&dir).staged.len(), 2);
    }

    #[test]
    fn add_update_stages_drops_but_not_new_tables() {
        let dir = setup();
        add(&dir, &[], true, false).unwrap();
        cmd_table(dir.path(), TableAction::Drop { name: table_name("tmp_scratch") }).unwrap();
        cmd_table(
            dir.path(),
            TableAction::Create {
                name: table_name("fresh"),
                columns: vec!["id:int:pk".parse().unwrap()],
            },
        )
        .unwrap();

        cmd_add(
            dir.path(),
            AddArgs { tables: vec![], all: false, update: true, force: false },
        )
        .unwrap();
        assert_eq!(roots(&dir).staged.table_names(), vec![table_name("users")]);
    }

    #[test]
    fn add_stages_collation_drift() {
        let dir = setup();
        let repo = Repo::open(dir.path()).unwrap();
        let r = repo.load_roots().unwrap();
        repo.save_roots(&r.with_working(r.working.set_collation(Collation::Binary)))
            .unwrap();

        add(&dir, &["users"], false, false).unwrap();
        assert_eq!(roots(&dir).staged.collation(), Collation::Binary);
    }

    #[test]
    fn reset_restores_head() {
        let dir = setup();
        add(&dir, &[], true, true).unwrap();
        cmd_reset(dir.path(), ResetArgs { tables: vec![table_name("users")] }).unwrap();
        assert_eq!(roots(&dir).staged.table_names(), vec![table_name("tmp_scratch")]);

        cmd_reset(dir.path(), ResetArgs { tables: vec![] }).unwrap();
        assert!(roots(&dir).staged.is_empty());
    }

    #[test]
    fn put_rejects_wrong_arity_and_types() {
        let dir = setup();
        let put = |values: &[&str]| {
            cmd_table(
                dir.path(),
                TableAction::Put {
                    name: table_name("users"),
                    values: values.iter().map(|v| v.to_string()).collect(),
                },
            )
        };
        assert!(put(&["2"]).is_err());
        assert!(put(&["two", "bob"]).is_err());
        put(&["2", "bob"]).unwrap();
        assert_eq!(
            roots(&dir).working.get_table(&table_name("users")).unwrap().row_count(),
            2
        );
    }

    #[test]
    fn create_existing_table_fails() {
        let dir = setup();
        let err = cmd_table(
            dir.path(),
            TableAction::Create {
                name: table_name("users"),
                columns: vec!["id:int:pk".parse().unwrap()],
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn export_then_copy_stream() {
        let dir = setup();
        let exported = dir.path().join("users.tuples");
        let copied = dir.path().join("copy.tuples");
        cmd_table(
            dir.path(),
            TableAction::Export {
                name: table_name("users"),
                output: exported.clone(),
                staged: false,
            },
        )
        .unwrap();
        cmd_tuples(
            dir.path(),
            TuplesAction::Copy { input: exported.clone(), output: copied.clone() },
        )
        .unwrap();
        cmd_tuples(dir.path(), TuplesAction::Dump { input: copied.clone() }).unwrap();

        assert_eq!(std::fs::read(&exported).unwrap(), std::fs::read(&copied).unwrap());
        let tuples =
            tvc_tuple::decode_tuples(std::fs::read(&copied).unwrap().into(), None).unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].values().unwrap(), vec![Value::Int(1)]);
    }

    #[test]
    fn dump_reports_truncated_stream() {
        let dir = setup();
        let path = dir.path().join("bad.tuples");
        std::fs::write(&path, [0u8, 0, 0, 9, 1, 2]).unwrap();
        let err = cmd_tuples(dir.path(), TuplesAction::Dump { input: path }).unwrap_err();
        assert!(err
            .downcast_ref::<tvc_tuple::TupleError>()
            .is_some_and(tvc_tuple::TupleError::is_corruption));
    }
}
