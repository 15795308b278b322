//! Subcommand handlers.

use anyhow::{bail, Context};

use caroumate::carousel::style;
use caroumate::persistence::local::migrate_local_history;
use caroumate::persistence::{most_used_category, LocalStore};
use caroumate::{
    AiModel, AspectRatio, BulkReport, Carousel, DesignPreferences, DesignStyle, Direction,
    FlatRasterizer, GenerationRequest, SlidePart,
};

use crate::{App, Command, DirectionArg, PartArg};

pub async fn run(app: &mut App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Generate {
            topic,
            niche,
            aspect_ratio,
            style,
            magic,
        } => {
            let preferences = DesignPreferences::default()
                .with_aspect_ratio(parse_value::<AspectRatio>(&aspect_ratio, "aspect ratio")?)
                .with_style(parse_value::<DesignStyle>(&style, "style")?);
            let mut request = GenerationRequest::new(topic)
                .with_preferences(preferences)
                .with_magic_create(magic);
            if let Some(niche) = niche {
                request = request.with_niche(niche);
            }
            let carousel = app.orchestrator.generate(request).await?;
            print_carousel(&carousel);
            warn_session_error(app);
        }
        Command::Images { carousel } => {
            open(app, &carousel).await?;
            let report = app.orchestrator.generate_all_images().await?;
            print_report("images", &report);
        }
        Command::Videos { carousel } => {
            open(app, &carousel).await?;
            let report = app.orchestrator.generate_all_videos().await?;
            print_report("videos", &report);
        }
        Command::Image { carousel, slide } => {
            let current = open(app, &carousel).await?;
            let id = slide_id(&current, &slide)?;
            app.orchestrator.generate_slide_image(&id).await?;
            println!("Image generated for slide {}", slide);
        }
        Command::Video { carousel, slide } => {
            let current = open(app, &carousel).await?;
            let id = slide_id(&current, &slide)?;
            app.orchestrator.generate_slide_video(&id).await?;
            println!("Video generated for slide {}", slide);
        }
        Command::EditImage {
            carousel,
            slide,
            instruction,
        } => {
            let current = open(app, &carousel).await?;
            let id = slide_id(&current, &slide)?;
            let next = app.orchestrator.edit_slide_image(&id, &instruction).await?;
            if next == current {
                println!("Slide {} has no image to edit", slide);
            } else {
                println!("Image edited for slide {}", slide);
            }
        }
        Command::Regenerate {
            carousel,
            slide,
            part,
        } => {
            let current = open(app, &carousel).await?;
            let id = slide_id(&current, &slide)?;
            let part = match part {
                PartArg::Headline => SlidePart::Headline,
                PartArg::Body => SlidePart::Body,
            };
            let next = app.orchestrator.regenerate_content(&id, part).await?;
            if let Some(updated) = next.slide(&id) {
                let text = match part {
                    SlidePart::Headline => &updated.headline,
                    SlidePart::Body => &updated.body,
                };
                println!("{}", text);
            }
        }
        Command::Caption { carousel } => {
            open(app, &carousel).await?;
            println!("{}", app.orchestrator.generate_caption().await?);
        }
        Command::Thread { carousel } => {
            open(app, &carousel).await?;
            println!("{}", app.orchestrator.generate_thread().await?);
        }
        Command::Suggest { carousel } => {
            open(app, &carousel).await?;
            let next = app.orchestrator.suggest_design().await?;
            let prefs = &next.preferences;
            println!(
                "Applied: background {}, font color {}, style {}, font {}",
                prefs.background_color,
                prefs.font_color,
                prefs.style.as_str(),
                prefs.font
            );
        }
        Command::Brand { carousel } => {
            open(app, &carousel).await?;
            let next = app.orchestrator.apply_brand_kit().await?;
            println!(
                "Brand kit applied: background {}, font color {}",
                next.preferences.background_color, next.preferences.font_color
            );
        }
        Command::Move {
            carousel,
            slide,
            direction,
        } => {
            let current = open(app, &carousel).await?;
            let id = slide_id(&current, &slide)?;
            let direction = match direction {
                DirectionArg::Left => Direction::Left,
                DirectionArg::Right => Direction::Right,
            };
            let next = app.orchestrator.move_slide(&id, direction).await?;
            print_carousel(&next);
        }
        Command::List => {
            let history = app.orchestrator.history().await?;
            if history.is_empty() {
                println!("No carousels yet.");
            }
            for carousel in &history {
                println!(
                    "{}  {}  [{}]  {} slides  {}",
                    carousel.id,
                    carousel.created_at.format("%Y-%m-%d %H:%M"),
                    carousel.category,
                    carousel.slides.len(),
                    carousel.title
                );
            }
            println!(
                "\nTotal: {}  Most used category: {}  Downloads: {}",
                history.len(),
                most_used_category(&history),
                app.context.download_count()
            );
        }
        Command::Delete { carousel } => {
            app.orchestrator.delete_carousel(&carousel).await?;
            println!("Deleted {}", carousel);
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("This deletes every carousel. Re-run with --yes to confirm.");
            }
            app.orchestrator.clear_history().await?;
            println!("History cleared.");
        }
        Command::Export { carousel, out } => {
            let current = open(app, &carousel).await?;
            let rasterizer = FlatRasterizer::new(current);
            let path = app
                .orchestrator
                .download(&rasterizer, &out, &mut app.context)
                .await?;
            println!("Saved {}", path.display());
        }
        Command::Migrate => migrate(app).await?,
        Command::Settings {
            set_api_key,
            model,
            system_prompt,
        } => {
            let settings = &mut app.context.settings;
            let mut changed = false;
            if let Some(key) = set_api_key {
                settings.api_key = key;
                changed = true;
            }
            if let Some(model) = model {
                settings.ai_model = AiModel::parse(&model)
                    .with_context(|| format!("Unknown model: {}", model))?;
                changed = true;
            }
            if let Some(prompt) = system_prompt {
                settings.system_prompt = prompt;
                changed = true;
            }
            if changed {
                app.context.save()?;
                println!("Settings saved to {}", app.context.dir().display());
            }
            let settings = &app.context.settings;
            println!("Model:      {}", settings.ai_model.as_str());
            println!("API key:    {}", if settings.has_api_key() { "set" } else { "not set" });
            println!("Prompt:     {}", settings.system_prompt);
            if let Some(kit) = &settings.brand_kit {
                println!(
                    "Brand kit:  {} / {} / {}, font {}",
                    kit.colors.primary, kit.colors.secondary, kit.colors.text, kit.fonts.body
                );
            }
            println!("Downloads:  {}", app.context.download_count());
        }
    }
    Ok(())
}

async fn open(app: &App, carousel_id: &str) -> anyhow::Result<Carousel> {
    app.orchestrator
        .open_saved(carousel_id)
        .await
        .with_context(|| format!("Could not open carousel {}", carousel_id))
}

/// Accepts a 1-based slide number or a slide ID.
fn slide_id(carousel: &Carousel, arg: &str) -> anyhow::Result<String> {
    if let Ok(n) = arg.parse::<usize>() {
        if let Some(slide) = n.checked_sub(1).and_then(|i| carousel.slides.get(i)) {
            return Ok(slide.id.clone());
        }
    }
    match carousel.slide(arg) {
        Some(slide) => Ok(slide.id.clone()),
        None => bail!("No slide {} in carousel {}", arg, carousel.id),
    }
}

fn parse_value<T: serde::de::DeserializeOwned>(value: &str, what: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("Invalid {}: {}", what, value))
}

async fn migrate(app: &mut App) -> anyhow::Result<()> {
    let Some((remote, owner)) = app.remote.clone() else {
        bail!("Migration needs SUPABASE_URL, SUPABASE_ANON_KEY and CAROUMATE_USER_ID.");
    };
    let local = LocalStore::open(app.context.history_path())?;
    if local.is_empty() {
        println!("No local carousels to migrate.");
        return Ok(());
    }

    app.bar.start(local.len());
    let bar = app.bar.clone();
    let report = migrate_local_history(&local, &*remote, &owner, |index, _, carousel| {
        bar.step(index, carousel.title.clone());
    })
    .await;
    app.bar.finish();

    let report = report?;
    println!(
        "Migrated {} carousels ({} given new IDs)",
        report.migrated, report.reassigned
    );
    Ok(())
}

fn print_carousel(carousel: &Carousel) {
    println!("{}  {}", carousel.id, carousel.title);
    for (i, slide) in carousel.slides.iter().enumerate() {
        let visual = match style::visual_kind(Some(slide), Some(&carousel.preferences)) {
            style::VisualKind::Image => " [image]",
            style::VisualKind::Video => " [video]",
            style::VisualKind::None => "",
        };
        println!("  {}. {}{}", i + 1, slide.headline, visual);
        if !slide.body.is_empty() {
            println!("     {}", slide.body);
        }
    }
}

fn print_report(what: &str, report: &BulkReport) {
    println!(
        "{} {} generated, {} failed",
        report.succeeded.len(),
        what,
        report.failed.len()
    );
    for (slide_id, message) in &report.failed {
        eprintln!("  {}: {}", slide_id, message);
    }
    if !report.persisted {
        eprintln!("Warning: final save did not complete.");
    }
}

fn warn_session_error(app: &App) {
    if let Some(message) = app.orchestrator.last_error() {
        eprintln!("Warning: {}", message);
    }
}
