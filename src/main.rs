use anyhow::Context;
use candle_core::Device;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use steam_rec::logging::init_logging;
use steam_rec::{
    build_implicit_interactions, load_steam_200k_csv, Dataset, FallbackBlend, ItemCFRecommender,
    PopularityRecommender, PrecomputedItemCF, RecommendContext, Recommendation, Recommender,
    SparseWeightMatrix, WeightedInteraction, WeightingConfig,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "steamrec", about = "Game recommendations from steam-200k play logs")]
struct Args {
    /// Path to steam-200k.csv
    #[arg(long, default_value = "dataset/steam-200k.csv")]
    dataset: PathBuf,

    /// JSON file with purchase_weight / play_weight / min_play_hours
    #[arg(long)]
    weights_file: Option<PathBuf>,

    #[arg(long)]
    purchase_weight: Option<f32>,

    #[arg(long)]
    play_weight: Option<f32>,

    #[arg(long)]
    min_play_hours: Option<f32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show top games by popularity
    Top {
        #[arg(long, default_value_t = 20)]
        n: usize,
    },
    /// Recommend games for a user
    Recommend {
        #[arg(long)]
        user_id: u64,
        #[arg(long, default_value_t = 10)]
        n: usize,
        #[arg(long, value_enum, default_value_t = Method::Itemcf)]
        method: Method,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Popularity,
    Itemcf,
    /// Dense item-item similarity (small catalogs only)
    ItemcfDense,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Args {
    fn weighting_config(&self) -> anyhow::Result<WeightingConfig> {
        let mut config = match &self.weights_file {
            Some(path) => WeightingConfig::load(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            None => WeightingConfig::default(),
        };
        if let Some(w) = self.purchase_weight {
            config.purchase_weight = w;
        }
        if let Some(w) = self.play_weight {
            config.play_weight = w;
        }
        if let Some(h) = self.min_play_hours {
            config.min_play_hours = h;
        }
        Ok(config)
    }
}

fn print_recommendations(recs: &[Recommendation], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for (i, r) in recs.iter().enumerate() {
                println!("{:02}. {}  score={:.3}", i + 1, r.title, r.score);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(recs)?),
    }
    Ok(())
}

/// recommend サブコマンドの結果
#[derive(Debug)]
enum Outcome {
    Recommended {
        owned_count: usize,
        recs: Vec<Recommendation>,
    },
    UnknownUser {
        sample: Vec<u64>,
    },
}

impl Outcome {
    fn code(&self) -> u8 {
        match self {
            Outcome::Recommended { .. } => 0,
            Outcome::UnknownUser { .. } => 2,
        }
    }
}

fn run_recommend(
    interactions: &[WeightedInteraction],
    user_id: u64,
    n: usize,
    method: Method,
) -> anyhow::Result<Outcome> {
    let ds = Dataset::index(interactions);
    let Ok(user_index) = ds.user_index(user_id) else {
        let sample = ds.user_ids().iter().take(10).copied().collect();
        return Ok(Outcome::UnknownUser { sample });
    };

    let user_item = SparseWeightMatrix::build(&ds, interactions)?;
    let owned_titles: HashSet<String> = user_item
        .owned_items(user_index)
        .into_iter()
        .map(|i| ds.game_titles()[i].clone())
        .collect();
    let owned_count = owned_titles.len();
    let ctx = RecommendContext::for_user(user_index, n).excluding(owned_titles);

    let popularity = PopularityRecommender::new(interactions);
    info!(user_id, ?method, n, "recommending");
    let recs = match method {
        Method::Popularity => popularity.top_n(n, &ctx.exclude),
        Method::Itemcf => {
            let model = ItemCFRecommender::new(&user_item, ds.game_titles());
            FallbackBlend {
                primary: &model,
                fallback: &popularity,
            }
            .recommend(&ctx)?
        }
        Method::ItemcfDense => {
            let model = PrecomputedItemCF::new(&user_item, ds.game_titles(), &Device::Cpu)?;
            FallbackBlend {
                primary: &model,
                fallback: &popularity,
            }
            .recommend(&ctx)?
        }
    };
    Ok(Outcome::Recommended { owned_count, recs })
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = args.weighting_config()?;
    let raw = load_steam_200k_csv(&args.dataset)?;
    let interactions = build_implicit_interactions(&raw, &config)?;

    let (user_id, n, method) = match args.cmd {
        Command::Top { n } => {
            let popularity = PopularityRecommender::new(&interactions);
            let recs = popularity.top_n(n, &HashSet::new());
            print_recommendations(&recs, args.format)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Recommend { user_id, n, method } => (user_id, n, method),
    };

    let outcome = run_recommend(&interactions, user_id, n, method)?;
    match &outcome {
        Outcome::UnknownUser { sample } => {
            println!("Unknown user_id={user_id}. Try one of: {sample:?} ...");
        }
        Outcome::Recommended { owned_count, recs } => {
            if let OutputFormat::Text = args.format {
                println!("User {user_id} owns {owned_count} games");
            }
            print_recommendations(recs, args.format)?;
        }
    }
    Ok(ExitCode::from(outcome.code()))
}
