use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, Local};
use clap::{ArgAction, Parser};
use dialoguer::{Input, Select};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use kintree::serve::{ServeArgs, run_serve};
use kintree::store::parse_tree;
use kintree::tree::FamilyTree;
use kintree::{
    Gender, LayoutConfig, Person, TreeLayout, audit, person_by_id, render_svg,
    upcoming_anniversaries_in, upcoming_birthdays_in,
};

const DEFAULT_NEW_TREE_NAME: &str = "familytree.json";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "kintree",
    about = "Query, lay out and render family trees stored as flat JSON person records."
)]
pub struct RenderArgs {
    /// Path to the input tree file. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Path to the output SVG file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Person to center the tree on (defaults to the first person in the file).
    #[arg(short = 'c', long = "center")]
    center: Option<String>,

    /// Canvas width in pixels.
    #[arg(long = "width", default_value_t = kintree::layout::DEFAULT_WIDTH)]
    width: f32,

    /// Canvas height in pixels (defaults to a height derived from the level count).
    #[arg(long = "height")]
    height: Option<f32>,

    /// Number of ancestor generations to include.
    #[arg(long = "ancestors", default_value_t = kintree::layout::MAX_ANCESTOR_LEVELS)]
    ancestors: usize,

    /// Number of descendant generations to include.
    #[arg(long = "descendants", default_value_t = kintree::layout::MAX_DESCENDANT_LEVELS)]
    descendants: usize,

    /// Background color for the rendered tree.
    #[arg(short = 'b', long = "background-color", default_value = kintree::render::DEFAULT_BACKGROUND)]
    background_color: String,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "kintree events",
    about = "List birthdays and wedding anniversaries for a month."
)]
pub struct EventsArgs {
    /// Path to the input tree file. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Month to list events for, 1 through 12 (defaults to the current month).
    #[arg(short = 'm', long = "month")]
    month: Option<u32>,
}

#[derive(Debug, Parser)]
#[command(
    name = "kintree check",
    about = "Audit a tree file for broken references and inconsistent links."
)]
pub struct CheckArgs {
    /// Path to the input tree file. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "kintree new", about = "Create a new family tree file.")]
pub struct NewArgs {
    /// Path for the new tree file.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Seed the tree with a three-generation sample family instead of prompting.
    #[arg(long = "sample", action = ArgAction::SetTrue)]
    sample: bool,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

pub async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let serve_args = ServeArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_serve(serve_args, None).await
        }
        Some("render") => {
            let render_args = RenderArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_render(render_args)
        }
        Some("events") => {
            let events_args = EventsArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_events(events_args)
        }
        Some("check") => {
            let check_args = CheckArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_check(check_args)
        }
        Some("new") => {
            let new_args = NewArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_new(new_args)
        }
        _ => {
            let render_args = RenderArgs::parse_from(args);
            run_render(render_args)
        }
    }
}

fn run_render(cli: RenderArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let output_dest = parse_output(cli.output.as_deref(), &input_source)?;

    let tree = load_tree(&input_source)?;

    let center_id = match cli.center.as_deref() {
        Some(id) => id.to_string(),
        None => tree
            .tree_data
            .first()
            .map(|person| person.person_id.clone())
            .ok_or_else(|| anyhow!("tree does not contain any people"))?,
    };

    if person_by_id(&center_id, &tree.tree_data).is_none() {
        bail!("person '{center_id}' not found in the tree");
    }

    let config = LayoutConfig {
        width: cli.width,
        height: cli.height,
        max_ancestor_levels: cli.ancestors,
        max_descendant_levels: cli.descendants,
        ..LayoutConfig::default()
    };

    let layout = TreeLayout::compute(&center_id, &tree.tree_data, &config);
    let svg = render_svg(&layout, &center_id, &cli.background_color)?;

    write_output(output_dest, svg.as_bytes(), cli.quiet)?;

    Ok(())
}

fn run_events(cli: EventsArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let tree = load_tree(&input_source)?;

    let month0 = match cli.month {
        Some(month @ 1..=12) => month - 1,
        Some(other) => bail!("--month must be between 1 and 12, got {other}"),
        None => Local::now().date_naive().month0(),
    };
    let month_name = MONTH_NAMES[month0 as usize];

    let birthdays = upcoming_birthdays_in(&tree.tree_data, month0);
    let anniversaries = upcoming_anniversaries_in(&tree.tree_data, month0);

    println!("Events in {month_name}:");
    if birthdays.is_empty() && anniversaries.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for entry in &birthdays {
        println!(
            "  {:>2} {month_name}: birthday of {} (born {})",
            entry.day, entry.name, entry.dob
        );
    }
    for entry in &anniversaries {
        println!(
            "  {:>2} {month_name}: anniversary of {} (married {})",
            entry.day, entry.couple, entry.marriage_date
        );
    }

    Ok(())
}

fn run_check(cli: CheckArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let tree = load_tree(&input_source)?;

    let issues = audit(&tree.tree_data);
    if issues.is_empty() {
        println!("No issues found in {} people.", tree.tree_data.len());
        return Ok(());
    }

    for issue in &issues {
        println!("{issue}");
    }
    bail!("found {} issue(s)", issues.len());
}

fn run_new(cli: NewArgs) -> Result<()> {
    let mut target_path = match cli.output {
        Some(path_str) => {
            if path_str == "-" {
                bail!("'new' requires a file path, not stdout");
            }
            PathBuf::from(path_str)
        }
        None => PathBuf::from(DEFAULT_NEW_TREE_NAME),
    };

    if target_path.extension().is_none() {
        target_path.set_extension("json");
    }

    if let Some(parent) = target_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
        }
    }

    target_path = ensure_unique_path(target_path);

    let tree = if cli.sample {
        FamilyTree::sample()
    } else {
        prompt_tree()?
    };

    let contents = serde_json::to_string_pretty(&tree)?;

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target_path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            bail!(
                "tree file '{}' already exists; refusing to overwrite",
                target_path.display()
            );
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to create '{}'", target_path.display()));
        }
    };

    file.write_all(contents.as_bytes())?;
    file.flush()?;

    if !cli.quiet {
        println!("Created family tree '{}'.", target_path.display());
        println!("People: {}", tree.tree_data.len());
    }

    Ok(())
}

fn prompt_tree() -> Result<FamilyTree> {
    let tree_name: String = Input::new()
        .with_prompt("Tree name")
        .interact_text()
        .context("tree name entry was cancelled")?;

    let creator_email: String = Input::new()
        .with_prompt("Your email address")
        .allow_empty(true)
        .interact_text()
        .context("email entry was cancelled")?;

    let first_name: String = Input::new()
        .with_prompt("First name of the first family member")
        .interact_text()
        .context("first name entry was cancelled")?;

    let last_name: String = Input::new()
        .with_prompt("Last name")
        .interact_text()
        .context("last name entry was cancelled")?;

    let options = ["male", "female", "other"];
    let selection = Select::new()
        .with_prompt("Gender")
        .items(&options)
        .default(0)
        .interact()
        .context("gender selection was cancelled")?;
    let gender = match selection {
        0 => Gender::Male,
        1 => Gender::Female,
        _ => Gender::Other,
    };

    let dob: String = Input::new()
        .with_prompt("Date of birth (YYYY-MM-DD, empty to skip)")
        .allow_empty(true)
        .interact_text()
        .context("date of birth entry was cancelled")?;

    let dob = dob.trim();
    let mut tree = FamilyTree::starter();
    tree.tree_name = tree_name.trim().to_string();
    tree.creator_email_id = creator_email.trim().to_string();
    if let Some(person) = tree.tree_data.first_mut() {
        *person = Person {
            person_id: person.person_id.clone(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            gender,
            dob: (!dob.is_empty()).then(|| dob.to_string()),
            ..Person::default()
        };
    }

    Ok(tree)
}

fn ensure_unique_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "familytree".to_string());
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(String::from);

    let mut counter = 1;
    loop {
        let mut candidate = path.clone();
        let name = match &extension {
            Some(ext) => format!("{stem}{counter}.{ext}"),
            None => format!("{stem}{counter}"),
        };
        candidate.set_file_name(&name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        Some("-") => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("input file '{path_str}' does not exist"));
            }
            Ok(InputSource::File(path))
        }
        None => Ok(InputSource::Stdin),
    }
}

fn parse_output(output: Option<&str>, input: &InputSource) -> Result<OutputDestination> {
    match output {
        Some("-") => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
        None => match input {
            InputSource::File(path) => {
                let default_name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| format!("{name}.svg"))
                    .unwrap_or_else(|| "out.svg".to_string());
                let mut default_path = path.to_path_buf();
                default_path.set_file_name(default_name);
                Ok(OutputDestination::File(default_path))
            }
            InputSource::Stdin => Ok(OutputDestination::File(PathBuf::from("out.svg"))),
        },
    }
}

fn load_tree(source: &InputSource) -> Result<FamilyTree> {
    let contents = load_contents(source)?;
    let mut tree = parse_tree(&contents).context("failed to parse tree file")?;

    if tree.tree_id.is_empty() {
        if let InputSource::File(path) = source {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                tree.tree_id = stem.to_string();
            }
        }
    }

    Ok(tree)
}

fn load_contents(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            if buffer.trim().is_empty() {
                Err(anyhow!("no tree data supplied on stdin"))
            } else {
                Ok(buffer)
            }
        }
        InputSource::File(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if contents.trim().is_empty() {
                Err(anyhow!("input file '{}' was empty", path.display()))
            } else {
                Ok(contents)
            }
        }
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)?;
            if !quiet {
                println!("Generated tree view -> {}", path.display());
            }
        }
    }
    Ok(())
}
