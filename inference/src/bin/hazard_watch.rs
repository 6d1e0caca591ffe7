/// Hazard Watch operator console
///
/// Plays a video source through the hazard annotation pipeline and reads
/// operator commands from stdin, one per line:
///
///   play | pause | toggle | seek <0..1> | restart
///   detect on|off|toggle | category <name>|none
///   snapshot | save <path> | status | help | quit
///
/// Usage:
///   hazard-watch --category fire --detect --autoplay clip.mp4
///   hazard-watch --dry-run --no-realtime frames/
use clap::Parser;
use hazard_watch::capture::save_image;
use hazard_watch::{
    Category, DetectorRegistry, DetectorType, HazardConfig, LatestFrameSink, PipelineCoordinator,
    PlaybackController, SnapshotWriter, VideoSource,
};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-hazard video annotation console")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Category selected at startup (crowd, fire, smoking, vehicle, weapon)
    #[arg(long)]
    category: Option<Category>,
    /// Start with detection enabled
    #[arg(long)]
    detect: bool,
    /// Use scripted detectors that find nothing instead of loading models
    #[arg(long)]
    dry_run: bool,
    /// Categories whose models are loaded (defaults to all)
    #[arg(long, value_delimiter = ',')]
    load: Vec<Category>,
    /// Decode as fast as possible instead of at the source frame rate
    #[arg(long)]
    no_realtime: bool,
    /// Start playing right after opening the source
    #[arg(long)]
    autoplay: bool,
    /// Video file, camera index, image directory or single image
    source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    On,
    Off,
    Toggle,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Play,
    Pause,
    Toggle,
    Seek(f64),
    Restart,
    Detect(Switch),
    Category(Option<Category>),
    Snapshot,
    Save(PathBuf),
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| "empty command".to_string())?;
        let arg = parts.next();

        let command = match (name.to_lowercase().as_str(), arg) {
            ("play", None) => Command::Play,
            ("pause", None) => Command::Pause,
            ("toggle", None) => Command::Toggle,
            ("restart", None) => Command::Restart,
            ("snapshot", None) => Command::Snapshot,
            ("status", None) => Command::Status,
            ("help", None) => Command::Help,
            ("quit" | "exit", None) => Command::Quit,
            ("seek", Some(value)) => Command::Seek(
                value
                    .parse()
                    .map_err(|_| format!("invalid seek fraction '{}'", value))?,
            ),
            ("detect", Some(value)) => Command::Detect(match value {
                "on" => Switch::On,
                "off" => Switch::Off,
                "toggle" => Switch::Toggle,
                other => return Err(format!("expected on|off|toggle, got '{}'", other)),
            }),
            ("category", Some("none")) => Command::Category(None),
            ("category", Some(value)) => {
                Command::Category(Some(value.parse().map_err(|e| format!("{}", e))?))
            }
            ("save", Some(path)) => Command::Save(PathBuf::from(path)),
            (other, _) => return Err(format!("unknown command '{}' (try 'help')", other)),
        };

        if parts.next().is_some() {
            return Err(format!("too many arguments for '{}'", name));
        }
        Ok(command)
    }
}

const HELP: &str = "commands: play | pause | toggle | seek <0..1> | restart | \
detect on|off|toggle | category <name>|none | snapshot | save <path> | status | quit";

struct Console {
    player: PlaybackController,
    sink: Arc<LatestFrameSink>,
    snapshots: SnapshotWriter,
}

impl Console {
    /// Execute one command; returns false when the console should exit
    fn execute(&self, command: Command) -> Result<bool, Box<dyn std::error::Error>> {
        let session = self.player.coordinator().session();
        match command {
            Command::Play => self.player.play()?,
            Command::Pause => self.player.pause(),
            Command::Toggle => {
                let state = self.player.toggle()?;
                println!("player {}", state);
            }
            Command::Seek(fraction) => self.player.seek(fraction)?,
            Command::Restart => self.player.restart()?,
            Command::Detect(switch) => {
                let active = match switch {
                    Switch::On => {
                        session.set_active(true);
                        true
                    }
                    Switch::Off => {
                        session.set_active(false);
                        false
                    }
                    Switch::Toggle => session.toggle(),
                };
                println!("detection {}", if active { "on" } else { "off" });
            }
            Command::Category(category) => {
                session.set_category(category);
                match category {
                    Some(category) => println!("category {}", category),
                    None => println!("category none"),
                }
            }
            Command::Snapshot => match self.player.coordinator().current_raw_frame() {
                Some(frame) => {
                    let path = self.snapshots.save(&frame)?;
                    println!("saved {}", path.display());
                }
                None => println!("no frame decoded yet"),
            },
            Command::Save(path) => match self.sink.latest() {
                Some(frame) => {
                    save_image(&frame.image, &path)?;
                    println!("saved frame {} to {}", frame.index, path.display());
                }
                None => println!("no frame published yet"),
            },
            Command::Status => self.print_status()?,
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn print_status(&self) -> Result<(), Box<dyn std::error::Error>> {
        let coordinator = self.player.coordinator();
        let (active, category) = coordinator.session().snapshot();
        let playback = self.player.status();
        let status = json!({
            "time": playback.clock(),
            "playback": playback,
            "detection": {
                "active": active,
                "category": category,
            },
            "stats": coordinator.stats(),
            "last_published": self.sink.latest().map(|f| json!({
                "index": f.index,
                "annotated": f.annotated,
                "detections": f.detection_count,
            })),
        });
        println!("{}", serde_json::to_string(&status)?);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => HazardConfig::from_file(path)?,
        None => HazardConfig::default(),
    };
    if args.no_realtime {
        config.playback.realtime = false;
    }

    let categories: Vec<Category> = if args.load.is_empty() {
        Category::ALL.to_vec()
    } else {
        args.load.clone()
    };
    let kind = if args.dry_run {
        DetectorType::Scripted
    } else {
        DetectorType::YoloV8
    };
    let registry = DetectorRegistry::from_config(&config, kind, &categories)?;
    log::info!("{} detectors ready ({:?})", registry.len(), kind);

    let sink = Arc::new(LatestFrameSink::new());
    let coordinator = Arc::new(PipelineCoordinator::new(
        registry,
        config.thresholds(),
        sink.clone(),
    ));
    coordinator.session().set_category(args.category);
    coordinator.session().set_active(args.detect);

    let player = PlaybackController::new(Arc::clone(&coordinator), config.playback.clone());
    player.open(&VideoSource::parse(&args.source))?;
    if args.autoplay {
        player.play()?;
    }

    let console = Console {
        player,
        sink,
        snapshots: SnapshotWriter::from_config(&config.capture),
    };

    println!("hazard-watch {} ready; {}", hazard_watch::version(), HELP);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };
        match console.execute(command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {}", e),
        }
        io::stdout().flush()?;
    }

    console.player.pause();
    log::info!("Shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("play".parse::<Command>().unwrap(), Command::Play);
        assert_eq!(" PAUSE ".parse::<Command>().unwrap(), Command::Pause);
        assert_eq!("seek 0.25".parse::<Command>().unwrap(), Command::Seek(0.25));
        assert_eq!(
            "detect toggle".parse::<Command>().unwrap(),
            Command::Detect(Switch::Toggle)
        );
        assert_eq!(
            "category smoking".parse::<Command>().unwrap(),
            Command::Category(Some(Category::Smoking))
        );
        assert_eq!(
            "category none".parse::<Command>().unwrap(),
            Command::Category(None)
        );
        assert_eq!(
            "save out.png".parse::<Command>().unwrap(),
            Command::Save(PathBuf::from("out.png"))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("seek".parse::<Command>().is_err());
        assert!("seek half".parse::<Command>().is_err());
        assert!("detect maybe".parse::<Command>().is_err());
        assert!("category drone".parse::<Command>().is_err());
        assert!("play now".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "hazard-watch",
            "--category",
            "fire",
            "--detect",
            "--dry-run",
            "--load",
            "fire,weapon",
            "clip.mp4",
        ]);
        assert_eq!(args.category, Some(Category::Fire));
        assert!(args.detect && args.dry_run);
        assert_eq!(args.load, vec![Category::Fire, Category::Weapon]);
        assert_eq!(args.source, "clip.mp4");
    }
}
