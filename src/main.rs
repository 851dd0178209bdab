use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wayfarer::{
    api::{
        resolve_media_url, upload_cover_image, ApiError, Article, ContentApi, HttpContentApi,
        SortOrder,
    },
    articles::{ArticleDraft, ArticleFeed, ArticleFilters},
    categories::CategoryCache,
    comments::CommentThread,
    config::ClientConfig,
    session::{AuthSession, SessionStore},
    validation::{validate_login, validate_registration},
    WayfarerError,
};

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(about = "Browse and publish travel articles")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Base URL of the content API (overrides WAYFARER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where the login is kept between runs (overrides WAYFARER_SESSION_FILE)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email or username
    Login {
        identifier: String,
        #[arg(long, env = "WAYFARER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        username: String,
        email: String,
        #[arg(long, env = "WAYFARER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
    },
    Logout,
    Whoami,
    /// List article categories
    Categories {
        #[arg(long)]
        refresh: bool,
    },
    #[command(subcommand)]
    Articles(ArticleCommand),
    #[command(subcommand)]
    Comments(CommentCommand),
    /// Upload an image and print its URL
    Upload { path: PathBuf },
}

#[derive(Subcommand)]
enum ArticleCommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
        /// Exact title, case-insensitive
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value_t = SortOrder::NewestFirst)]
        sort: SortOrder,
        /// How many pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Show {
        document_id: String,
        #[arg(long)]
        comments: bool,
    },
    Create(ArticleFields),
    Edit {
        document_id: String,
        #[command(flatten)]
        fields: ArticleFields,
    },
    Delete { document_id: String },
}

#[derive(ClapArgs, Debug, Default)]
struct ArticleFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, conflicts_with = "cover_file")]
    cover_url: Option<String>,
    /// Local image uploaded as the cover
    #[arg(long)]
    cover_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CommentCommand {
    List {
        article_id: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Add { article_id: String, content: String },
    Edit { comment_id: String, content: String },
    Delete { comment_id: String },
}

struct App {
    api: Arc<dyn ContentApi>,
    categories: CategoryCache,
    session: AuthSession,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wayfarer={filter_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = ClientConfig::from_env().context("Failed to load configuration")?;
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }
    if let Some(session_file) = args.session_file {
        config.session_file = session_file;
    }
    debug!("using API at {}", config.api_url);

    let api: Arc<dyn ContentApi> = Arc::new(HttpContentApi::new(&config)?);
    let mut app = App {
        categories: CategoryCache::with_freshness(Arc::clone(&api), config.category_ttl),
        session: AuthSession::new(SessionStore::new(&config.session_file)),
        api,
    };
    app.session.restore(app.api.as_ref()).await?;

    let outcome = run(&mut app, args.command).await;
    if let Err(e) = &outcome {
        if is_session_rejected(e) && app.session.is_authenticated() {
            info!("session rejected by the server, signing out");
            app.session.logout(app.api.as_ref()).await?;
        }
    }
    outcome
}

fn is_session_rejected(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<ApiError>().is_some_and(ApiError::is_unauthorized)
            || cause
                .downcast_ref::<WayfarerError>()
                .is_some_and(WayfarerError::is_unauthorized)
    })
}

async fn run(app: &mut App, command: Command) -> anyhow::Result<()> {
    let api = Arc::clone(&app.api);
    let api = api.as_ref();

    match command {
        Command::Login {
            identifier,
            password,
        } => {
            validate_login(&identifier, &password)?;
            let user = app.session.login(api, &identifier, &password).await?;
            println!("Signed in as {}", user.username);
        }
        Command::Register {
            username,
            email,
            password,
            confirm_password,
        } => {
            let confirm = confirm_password.as_deref().unwrap_or(&password);
            validate_registration(&username, &email, &password, confirm)?;
            let user = app.session.register(api, &username, &email, &password).await?;
            println!("Welcome, {}", user.username);
        }
        Command::Logout => {
            app.session.logout(api).await?;
            println!("Signed out");
        }
        Command::Whoami => {
            let user = app.session.require_user()?;
            println!("{} <{}>", user.username, user.email);
        }
        Command::Categories { refresh } => {
            for category in app.categories.get_categories(refresh).await?.iter() {
                println!("{:>4}  {}", category.id, category.name);
            }
        }
        Command::Articles(command) => {
            app.session.require_user()?;
            run_articles(app, command).await?;
        }
        Command::Comments(command) => {
            app.session.require_user()?;
            run_comments(api, command).await?;
        }
        Command::Upload { path } => {
            app.session.require_user()?;
            let url = upload_cover_image(api, &path).await?;
            println!("{url}");
        }
    }

    Ok(())
}

async fn run_articles(app: &App, command: ArticleCommand) -> anyhow::Result<()> {
    let api = Arc::clone(&app.api);
    let api = api.as_ref();

    match command {
        ArticleCommand::List {
            search,
            title,
            category,
            sort,
            pages,
        } => {
            if !category.trim().is_empty()
                && app.categories.find_by_name(category.trim()).await?.is_none()
            {
                bail!("Unknown category '{}'", category.trim());
            }

            let mut feed = ArticleFeed::with_filters(ArticleFilters {
                search,
                title_exact: title,
                category_name: category,
                sort,
                ..ArticleFilters::default()
            });

            feed.refresh(api).await;
            for _ in 1..pages {
                if !feed.load_more(api).await {
                    break;
                }
            }
            if let Some(error) = &feed.state().error {
                bail!("{error}");
            }

            for article in feed.articles() {
                print_article_line(article);
            }
            println!(
                "page {} of {} ({})",
                feed.state().current_page,
                feed.state().total_pages,
                feed.filters().sort.label()
            );
        }
        ArticleCommand::Show {
            document_id,
            comments,
        } => {
            let article = api.get_article(&document_id).await?;
            print_article(api, &article);

            if comments {
                let mut thread = CommentThread::new();
                thread.fetch(api, &article.document_id, 1, true).await?;
                print_comments(&thread);
            }
        }
        ArticleCommand::Create(fields) => {
            let draft = fields.apply(api, ArticleDraft::default()).await?;
            let payload = draft.resolve(&app.categories).await?;
            let article = api.create_article(&payload).await?;
            println!("Created {}", article.document_id);
        }
        ArticleCommand::Edit {
            document_id,
            fields,
        } => {
            let article = api.get_article(&document_id).await?;
            let draft = ArticleDraft::from_article(&article, api.base_url());
            let draft = fields.apply(api, draft).await?;
            let payload = draft.resolve(&app.categories).await?;
            let article = api.update_article(&document_id, &payload).await?;
            println!("Updated {}", article.document_id);
        }
        ArticleCommand::Delete { document_id } => {
            api.delete_article(&document_id).await?;
            println!("Deleted {document_id}");
        }
    }

    Ok(())
}

async fn run_comments(api: &dyn ContentApi, command: CommentCommand) -> anyhow::Result<()> {
    let mut thread = CommentThread::new();

    match command {
        CommentCommand::List { article_id, pages } => {
            thread.fetch(api, &article_id, 1, true).await?;
            for _ in 1..pages {
                if !thread.load_more(api, &article_id).await? {
                    break;
                }
            }
            print_comments(&thread);
        }
        CommentCommand::Add {
            article_id,
            content,
        } => {
            let comment = thread.create(api, &content, &article_id).await?;
            println!("Posted {}", comment.document_id);
        }
        CommentCommand::Edit {
            comment_id,
            content,
        } => {
            thread.update(api, &comment_id, &content).await?;
            println!("Updated {comment_id}");
        }
        CommentCommand::Delete { comment_id } => {
            thread.delete(api, &comment_id).await?;
            println!("Deleted {comment_id}");
        }
    }

    Ok(())
}

impl ArticleFields {
    /// Overlays the given flags on a draft, uploading the cover file if
    /// one was passed.
    async fn apply(self, api: &dyn ContentApi, mut draft: ArticleDraft) -> anyhow::Result<ArticleDraft> {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(category) = self.category {
            draft.category_name = category;
        }
        if let Some(url) = self.cover_url {
            draft.cover_image_url = url;
        }
        if let Some(path) = self.cover_file {
            draft.cover_image_url = upload_cover_image(api, &path)
                .await
                .with_context(|| format!("Failed to upload {}", path.display()))?;
        }
        Ok(draft)
    }
}

fn print_article_line(article: &Article) {
    println!(
        "{:<12} [{}] {}",
        article.document_id,
        article.category_name(),
        article.title
    );
}

fn print_article(api: &dyn ContentApi, article: &Article) {
    println!("{}", article.title);
    println!("{}", "=".repeat(article.title.chars().count()));
    println!("Category: {}", article.category_name());
    if let Some(user) = &article.user {
        println!("By: {}", user.username);
    }
    if let Some(created_at) = article.created_at {
        println!("Published: {}", created_at.format("%d %b %Y"));
    }
    if let Some(cover) = &article.cover_image_url {
        println!("Cover: {}", resolve_media_url(api.base_url(), cover));
    }
    println!();
    println!("{}", article.description);
}

fn print_comments(thread: &CommentThread) {
    if thread.comments().is_empty() {
        println!("No comments yet.");
        return;
    }
    for comment in thread.comments() {
        let author = comment
            .user
            .as_ref()
            .map(|user| user.username.as_str())
            .unwrap_or("anonymous");
        println!("[{}] {}: {}", comment.document_id, author, comment.content);
    }
    if thread.has_more() {
        println!("(more comments available, use --pages)");
    }
}
