//! Wiring: shared state, handler trees, and the two dispatchers.

use crate::bot::admin::{self, AdminCommand, AdminConsole};
use crate::bot::client::{self, Command};
use crate::bot::common::{get_username, report_error};
use crate::bot::notifier::{AdminNotifier, TelegramNotifier};
use crate::bot::UnauthorizedCache;
use crate::catalog::Catalog;
use crate::config::{get_unauthorized_cache_max_size, get_unauthorized_cooldown, Settings};
use crate::queue::QueueStore;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Load the songbook and run both bots until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the songbook cannot be loaded.
pub async fn run_bots(settings: Arc<Settings>) -> anyhow::Result<()> {
    let catalog = Arc::new(Catalog::load(&settings.songbook_path)?);
    let store = Arc::new(QueueStore::new());
    let console = Arc::new(AdminConsole::from_settings(&settings));
    let unauthorized_cache = init_unauthorized_cache();

    let client_bot = Bot::new(settings.bot_token.clone());
    let admin_bot = Bot::new(settings.admin_bot_token.clone());

    let notifier: Arc<dyn AdminNotifier> = Arc::new(TelegramNotifier::new(
        admin_bot.clone(),
        settings.notify_chat_id.map(ChatId),
    ));

    register_commands(&client_bot, &admin_bot).await;

    let mut client_dispatcher = Dispatcher::builder(client_bot, client_schema())
        .dependencies(dptree::deps![
            store.clone(),
            catalog,
            settings.clone(),
            notifier
        ])
        .default_handler(|upd| async move {
            debug!("Unhandled client update: {:?}", upd.kind);
        })
        .enable_ctrlc_handler()
        .build();

    let mut admin_dispatcher = Dispatcher::builder(admin_bot, admin_schema())
        .dependencies(dptree::deps![store, console, settings, unauthorized_cache])
        .default_handler(|upd| async move {
            debug!("Unhandled admin update: {:?}", upd.kind);
        })
        .enable_ctrlc_handler()
        .build();

    info!("Both bots are running...");
    tokio::join!(client_dispatcher.dispatch(), admin_dispatcher.dispatch());
    info!("Bots stopped");

    Ok(())
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let max_size = get_unauthorized_cache_max_size();

    info!("Initializing UnauthorizedCache (cooldown: {cooldown}s, max_size: {max_size})");
    Arc::new(UnauthorizedCache::new(cooldown, max_size))
}

async fn register_commands(client_bot: &Bot, admin_bot: &Bot) {
    if let Err(e) = client_bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register client bot commands: {e}");
    }
    if let Err(e) = admin_bot.set_my_commands(AdminCommand::bot_commands()).await {
        warn!("Failed to register admin bot commands: {e}");
    }
}

fn client_schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_client_command),
        )
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_client_text))
}

fn admin_schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::filter(|msg: Message, console: Arc<AdminConsole>| {
                console.is_admin(get_username(&msg).as_deref())
            })
            .filter_command::<AdminCommand>()
            .endpoint(handle_admin_command),
        )
        // Everyone who did not pass the allow-list above
        .branch(
            dptree::entry()
                .filter_command::<AdminCommand>()
                .endpoint(handle_admin_unauthorized),
        )
}

async fn handle_client_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    store: Arc<QueueStore>,
    catalog: Arc<Catalog>,
    settings: Arc<Settings>,
    notifier: Arc<dyn AdminNotifier>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    let res = match cmd {
        Command::Start(payload) => {
            client::start(bot.clone(), msg, payload, store, catalog, settings).await
        }
        Command::Me => client::me(bot.clone(), msg, store).await,
        Command::Users => client::users(bot.clone(), msg, store).await,
        Command::Exit => client::exit(bot.clone(), msg, store, notifier).await,
        Command::Line => client::line(bot.clone(), msg, store, settings).await,
    };
    if let Err(e) = res {
        report_error(&bot, chat_id, "Client command", &e).await;
    }
    respond(())
}

async fn handle_client_text(
    bot: Bot,
    msg: Message,
    store: Arc<QueueStore>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    if let Err(e) = client::handle_text(bot.clone(), msg, store, settings).await {
        report_error(&bot, chat_id, "Text handler", &e).await;
    }
    respond(())
}

async fn handle_admin_command(
    bot: Bot,
    msg: Message,
    cmd: AdminCommand,
    store: Arc<QueueStore>,
    console: Arc<AdminConsole>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    if let Err(e) = admin::handle_command(bot.clone(), msg, cmd, store, console, settings).await {
        report_error(&bot, chat_id, "Admin command", &e).await;
    }
    respond(())
}

async fn handle_admin_unauthorized(
    bot: Bot,
    msg: Message,
    cache: Arc<UnauthorizedCache>,
) -> Result<(), teloxide::RequestError> {
    admin::handle_unauthorized(&bot, &msg, &cache).await;
    respond(())
}
