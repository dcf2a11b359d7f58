use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{InquireError, Select, Text};
use viralscript::script::{Character, Gender, SceneState};
use viralscript::state::{Severity, Step};
use viralscript::{Config, WizardController};

const NEXT: &str = "Next step";
const JUMP: &str = "Jump to step...";
const QUIT: &str = "Quit";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load()?;
    let controller = WizardController::new(config)?;
    if !controller.is_configured() {
        eprintln!(
            "API key not found for provider '{}'. Every generation step will fail until one is configured.",
            controller.config().llm.provider
        );
    }

    let mut last_log = 0;
    loop {
        let step = controller.step();
        println!("\n=== {} ===", step);

        let keep_going = match run_step(&controller, step).await {
            Ok(keep_going) => keep_going,
            Err(e) if is_cancel(&e) => false,
            Err(e) => return Err(e),
        };
        last_log = print_new_logs(&controller, last_log);

        if !keep_going {
            break;
        }
    }

    Ok(())
}

/// Runs one menu round for `step`. Returns `false` when the user quits.
async fn run_step(controller: &WizardController, step: Step) -> Result<bool> {
    let primary = match step {
        Step::Setup => {
            print_setup(controller);
            vec!["Set topic", "Add character", "Remove character"]
        }
        Step::Strategy => {
            print_strategy(controller);
            vec!["Generate strategy"]
        }
        Step::Scenes => {
            print_scenes(controller);
            vec!["Generate scenes"]
        }
        Step::Production => {
            print_production(controller);
            vec!["Start production"]
        }
        Step::ViralCheck => {
            print_viral(controller);
            vec!["Analyze"]
        }
        Step::Final => {
            println!("{}", controller.final_json()?);
            vec!["Export to file"]
        }
    };

    let mut options = primary;
    if step != Step::Final {
        options.push(NEXT);
    }
    options.extend([JUMP, QUIT]);

    let choice = Select::new("Action:", options).prompt()?;
    match choice {
        NEXT => {
            if controller.next_step().is_none() {
                println!("Set a topic and add at least one character first.");
            }
        }
        JUMP => {
            let target = Select::new("Go to:", Step::ALL.to_vec()).prompt()?;
            controller.go_to(target);
        }
        QUIT => return Ok(false),
        "Set topic" => {
            let topic = Text::new("Topic:").prompt()?;
            controller.set_topic(topic.trim());
        }
        "Add character" => controller.add_character(prompt_character()?),
        "Remove character" => {
            let names: Vec<String> = controller
                .snapshot()
                .characters
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {}", i + 1, c.name))
                .collect();
            if names.is_empty() {
                println!("No characters yet.");
            } else {
                let picked = Select::new("Remove:", names).raw_prompt()?;
                controller.remove_character(picked.index);
            }
        }
        // Handler failures are already in the activity log.
        "Generate strategy" => {
            let _ = controller.generate_strategy().await;
        }
        "Generate scenes" => {
            let _ = controller.plan_scenes().await;
        }
        "Start production" => run_production(controller).await?,
        "Analyze" => {
            let _ = controller.run_viral_check().await;
        }
        "Export to file" => {
            let path = controller.export()?;
            println!("Saved {}", path.display());
        }
        _ => {}
    }

    Ok(true)
}

fn prompt_character() -> Result<Character> {
    let name = Text::new("Name:").prompt()?;
    let gender = Select::new("Gender:", vec![Gender::Male, Gender::Female, Gender::Other]).prompt()?;
    let profile = Text::new("Profile:").prompt()?;
    let action = Text::new("Signature action (optional):").prompt()?;

    Ok(Character {
        name: name.trim().to_string(),
        gender,
        profile: profile.trim().to_string(),
        signature_action: Some(action.trim().to_string()).filter(|a| !a.is_empty()),
    })
}

async fn run_production(controller: &WizardController) -> Result<()> {
    let total = controller.snapshot().scenes.len();
    if total == 0 {
        println!("No scenes planned yet.");
        return Ok(());
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut rx = controller.subscribe();
    let production = controller.start_production();
    tokio::pin!(production);

    let result = loop {
        tokio::select! {
            result = &mut production => break result,
            changed = rx.changed() => {
                if changed.is_err() {
                    break (&mut production).await;
                }
                let state = controller.snapshot();
                let done = state.scenes.iter().filter(|s| s.state() == SceneState::ShotAssigned).count();
                pb.set_position(done as u64);
                pb.set_message(state.production_status.clone());
            }
        }
    };

    match result {
        Ok(report) => pb.finish_with_message(format!(
            "{} of {} scenes complete, {} failed",
            report.completed(),
            report.outcomes.len(),
            report.failed()
        )),
        Err(e) => pb.abandon_with_message(e.to_string()),
    }
    Ok(())
}

fn print_setup(controller: &WizardController) {
    let state = controller.snapshot();
    println!("Topic: {}", blank_or(&state.settings.topic));
    if state.characters.is_empty() {
        println!("Characters: (none)");
    }
    for c in &state.characters {
        println!(
            "  - {} ({}): {} [{}]",
            c.name,
            c.gender,
            c.profile,
            c.signature_action.as_deref().unwrap_or("no signature action")
        );
    }
}

fn print_strategy(controller: &WizardController) {
    let s = controller.snapshot().settings;
    println!("Audience:     {}", blank_or(&s.target_audience));
    println!("Emotion need: {}", blank_or(&s.emotion_need));
    println!("Style:        {}", blank_or(&s.style_template));
    println!("Memory point: {}", blank_or(&s.memory_point));
}

fn print_scenes(controller: &WizardController) {
    let scenes = controller.snapshot().scenes;
    if scenes.is_empty() {
        println!("No scenes planned yet.");
    }
    for scene in &scenes {
        println!("Scene {} [{}] @ {}", scene.id, scene.rhythm_type, scene.location);
        println!("    {}", scene.description);
        println!("    Conflict: {}", scene.conflict);
    }
}

fn print_production(controller: &WizardController) {
    let state = controller.snapshot();
    for scene in &state.scenes {
        println!("Scene {} ({}): {}", scene.id, scene.location, scene.state());
        for line in &scene.dialogues {
            let golden = if line.is_golden_sentence.unwrap_or(false) { " *" } else { "" };
            println!(
                "    [{}] {}: \"{}\"{} ({}; {})",
                line.shot_type.as_deref().unwrap_or("-"),
                line.speaker,
                line.text,
                golden,
                line.action,
                line.emotion
            );
        }
    }
    if !state.production_status.is_empty() {
        println!("Status: {}", state.production_status);
    }
}

fn print_viral(controller: &WizardController) {
    match controller.snapshot().viral_analysis {
        Some(a) => {
            println!("Hook strength:    {}", a.hook_strength);
            println!("Emotion peak:     {}", a.emotion_peak);
            println!("Rhythm fit:       {}", a.rhythm_fit);
            println!("Memory repeat:    {}", a.memory_repeat);
            println!("Spread potential: {}", a.spread_potential);
        }
        None => println!("Not analyzed yet."),
    }
}

fn print_new_logs(controller: &WizardController, after: u64) -> u64 {
    let state = controller.snapshot();
    let mut last = after;
    for entry in state.logs().iter().filter(|l| l.id > after) {
        let tag = match entry.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Warning => "warn",
            Severity::Error => "ERROR",
        };
        println!(
            "[{}] {:<15} {:<5} {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.role.to_string(),
            tag,
            entry.message
        );
        last = entry.id;
    }
    last
}

fn blank_or(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn is_cancel(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<InquireError>(),
        Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
    )
}
