use std::collections::HashMap;
use std::sync::Arc;

use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    prelude::*,
    types::{
        CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode,
    },
    utils::command::BotCommands,
};
use tokio::sync::RwLock;
use tracing::{error, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::handler::{handle_search, SearchOutcome, SEARCH_LIMIT};
use crate::storage::Storage;
use crate::tmdb::{Movie, TmdbClient};

const USAGE_HINT: &str = "Пришли название фильма, я поищу его в TMDb. Например: «Начало».";
const TMDB_DOWN: &str = "TMDb сейчас недоступен, попробуй чуть позже.";

/* ====== Зависимости и состояние ====== */

/// Что бот ждёт следующим текстовым сообщением в чате.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Search,
    Actor,
    Favorite,
}

/// Ожидаемый ввод по чатам. Явная зависимость: создаётся в main и
/// передаётся в обработчики, а не лежит статиком в модуле.
#[derive(Clone, Default)]
pub struct ChatState {
    pending: Arc<RwLock<HashMap<ChatId, Pending>>>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, chat: ChatId, p: Pending) {
        self.pending.write().await.insert(chat, p);
    }

    /// Забирает и сбрасывает ожидание.
    pub async fn take(&self, chat: ChatId) -> Option<Pending> {
        self.pending.write().await.remove(&chat)
    }
}

/// Зависимости обработчиков одним узлом, удобно клонировать в замыкания.
#[derive(Clone)]
pub struct Deps {
    pub tmdb: TmdbClient,
    pub storage: Storage,
    pub state: ChatState,
    pub record_misses: bool,
}

/* ====== Команды ====== */

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды:")]
enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "помощь")]
    Help,
    #[command(description = "добавить фильм в избранное")]
    Favorite(String),
    #[command(description = "показать избранное")]
    Favorites,
    #[command(description = "популярное сегодня")]
    Trending,
}

pub async fn run(bot: Bot, deps: Deps) {
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry().filter_command::<Command>().endpoint({
                        let deps = deps.clone();
                        move |bot: Bot, msg: Message, cmd: Command| {
                            let deps = deps.clone();
                            async move {
                                let res = on_command(&bot, &msg, cmd, &deps).await;
                                catch(res, &bot, msg.chat.id).await
                            }
                        }
                    }),
                )
                .branch({
                    let deps = deps.clone();
                    dptree::endpoint(move |bot: Bot, msg: Message| {
                        let deps = deps.clone();
                        async move {
                            let res = on_text(&bot, &msg, &deps).await;
                            catch(res, &bot, msg.chat.id).await
                        }
                    })
                }),
        )
        .branch(Update::filter_callback_query().endpoint({
            let deps = deps.clone();
            move |bot: Bot, q: CallbackQuery| {
                let deps = deps.clone();
                async move {
                    let chat = q.message.as_ref().map(|m| m.chat().id).unwrap_or(ChatId(0));
                    let res = on_callback(&bot, &q, &deps).await;
                    catch(res, &bot, chat).await
                }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Ни одна ошибка обработки не валит процесс: логируем и отвечаем
/// общим сообщением.
async fn catch(res: anyhow::Result<()>, bot: &Bot, chat: ChatId) -> ResponseResult<()> {
    if let Err(e) = res {
        error!("handler failed: {e:#}");
        let _ = bot
            .send_message(chat, "Что-то пошло не так, попробуй ещё раз.")
            .await;
    }
    Ok(())
}

/* ====== Команды ====== */

async fn on_command(bot: &Bot, msg: &Message, cmd: Command, deps: &Deps) -> anyhow::Result<()> {
    match cmd {
        Command::Start => {
            send_main_menu(
                bot,
                msg.chat.id,
                "Привет! Я ищу фильмы в TMDb. Пришли название или выбери действие:",
            )
            .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::Trending => send_trending(bot, msg.chat.id, deps).await?,
        Command::Favorites => send_favorites(bot, msg.chat.id, sender_id(msg), deps).await?,
        Command::Favorite(title) => run_favorite_search(bot, msg.chat.id, &title, deps).await?,
    }
    Ok(())
}

/* ====== Текст: поиск по умолчанию, иначе по ожидаемому вводу ====== */

async fn on_text(bot: &Bot, msg: &Message, deps: &Deps) -> anyhow::Result<()> {
    let Some(text) = message_text_any(msg) else {
        return Ok(());
    };
    match deps.state.take(msg.chat.id).await {
        Some(Pending::Actor) => run_actor_search(bot, msg.chat.id, &text, deps).await,
        Some(Pending::Favorite) => run_favorite_search(bot, msg.chat.id, &text, deps).await,
        Some(Pending::Search) | None => {
            run_movie_search(bot, msg.chat.id, sender_id(msg), &text, deps).await
        }
    }
}

async fn run_movie_search(
    bot: &Bot,
    chat: ChatId,
    user_id: i64,
    text: &str,
    deps: &Deps,
) -> anyhow::Result<()> {
    match handle_search(&deps.tmdb, &deps.storage, deps.record_misses, user_id, text).await {
        SearchOutcome::UsageHint => {
            bot.send_message(chat, USAGE_HINT).await?;
        }
        SearchOutcome::NotFound => {
            bot.send_message(chat, "Ничего не нашёл 😕 Попробуй другое название.")
                .await?;
        }
        SearchOutcome::LookupFailed => {
            bot.send_message(chat, TMDB_DOWN).await?;
        }
        SearchOutcome::Found(movies) => {
            send_movie_list(bot, chat, "Вот что нашлось:", &movies).await?;
        }
    }
    Ok(())
}

async fn run_actor_search(bot: &Bot, chat: ChatId, text: &str, deps: &Deps) -> anyhow::Result<()> {
    let name = text.trim();
    if name.is_empty() {
        bot.send_message(chat, "Пришли имя актёра или актрисы.").await?;
        return Ok(());
    }
    match deps.tmdb.search_person(name).await {
        Ok(Some(person)) => {
            let movies = person.known_movies();
            if movies.is_empty() {
                bot.send_message(chat, "У этого человека не нашлось известных фильмов.")
                    .await?;
            } else {
                bot.send_message(
                    chat,
                    format!("Известные фильмы: <b>{}</b>", html_escape(&person.name)),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard_movies(&movies, "detail", "🎬"))
                .await?;
            }
        }
        Ok(None) => {
            bot.send_message(chat, "Никого не нашёл по такому имени 😕").await?;
        }
        Err(e) => {
            warn!("person search failed for {name:?}: {e}");
            bot.send_message(chat, TMDB_DOWN).await?;
        }
    }
    Ok(())
}

async fn run_favorite_search(
    bot: &Bot,
    chat: ChatId,
    text: &str,
    deps: &Deps,
) -> anyhow::Result<()> {
    let query = text.trim();
    if query.is_empty() {
        bot.send_message(chat, "Укажи название после команды: /favorite Начало")
            .await?;
        return Ok(());
    }
    match deps.tmdb.search_movies(query, SEARCH_LIMIT).await {
        Ok(movies) if movies.is_empty() => {
            bot.send_message(chat, "Ничего не нашёл 😕 Попробуй другое название.")
                .await?;
        }
        Ok(movies) => {
            bot.send_message(chat, "Выбери фильм для избранного:")
                .reply_markup(keyboard_movies(&movies, "save", "⭐"))
                .await?;
        }
        Err(e) => {
            warn!("favorite search failed for {query:?}: {e}");
            bot.send_message(chat, TMDB_DOWN).await?;
        }
    }
    Ok(())
}

/* ====== Callback-кнопки ======
   detail:<id> — карточка фильма (описание, каст, постер)
   save:<id>   — сохранить в избранное
   genre:<id>  — подборка по жанру
   menu:<act>  — действия главного меню
*/
async fn on_callback(bot: &Bot, q: &CallbackQuery, deps: &Deps) -> anyhow::Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let chat = q.message.as_ref().map(|m| m.chat().id).unwrap_or(ChatId(0));
    let (cmd, arg) = parse_callback(data);

    match cmd {
        "detail" => {
            let Ok(id) = arg.parse::<u64>() else { return Ok(()) };
            send_movie_details(bot, q, chat, id, deps).await?;
        }
        "save" => {
            let Ok(id) = arg.parse::<u64>() else { return Ok(()) };
            save_favorite(bot, q, chat, id, deps).await?;
        }
        "genre" => {
            let Ok(id) = arg.parse::<u64>() else { return Ok(()) };
            ack_cb(bot, q).await?;
            match deps.tmdb.discover_by_genre(id, 10).await {
                Ok(movies) if movies.is_empty() => {
                    bot.send_message(chat, "По этому жанру ничего не нашлось.").await?;
                }
                Ok(movies) => send_movie_list(bot, chat, "Популярное в жанре:", &movies).await?,
                Err(e) => {
                    warn!("discover by genre {id} failed: {e}");
                    bot.send_message(chat, TMDB_DOWN).await?;
                }
            }
        }
        "menu" => {
            ack_cb(bot, q).await?;
            on_menu_action(bot, q, chat, arg, deps).await?;
        }
        _ => answer_cb(bot, q, "Неизвестная команда").await?,
    }
    Ok(())
}

async fn on_menu_action(
    bot: &Bot,
    q: &CallbackQuery,
    chat: ChatId,
    action: &str,
    deps: &Deps,
) -> anyhow::Result<()> {
    match action {
        "search" => {
            deps.state.set(chat, Pending::Search).await;
            bot.send_message(chat, "🔍 Пришли название фильма:").await?;
        }
        "actor" => {
            deps.state.set(chat, Pending::Actor).await;
            bot.send_message(chat, "🎭 Пришли имя актёра или актрисы:").await?;
        }
        "favorite" => {
            deps.state.set(chat, Pending::Favorite).await;
            bot.send_message(chat, "⭐ Пришли название фильма для избранного:")
                .await?;
        }
        "favorites" => send_favorites(bot, chat, cb_user_id(q), deps).await?,
        "trending" => send_trending(bot, chat, deps).await?,
        "genres" => send_genre_menu(bot, chat, deps).await?,
        "help" => {
            bot.send_message(chat, Command::descriptions().to_string())
                .await?;
        }
        _ => send_main_menu(bot, chat, "Чем ещё помочь?").await?,
    }
    Ok(())
}

/* ====== Представления ====== */

async fn send_main_menu(bot: &Bot, chat: ChatId, text: &str) -> anyhow::Result<()> {
    let kb = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🔍 Найти фильм", "menu:search"),
            InlineKeyboardButton::callback("🎭 Найти актёра", "menu:actor"),
        ],
        vec![
            InlineKeyboardButton::callback("🎬 Популярное", "menu:trending"),
            InlineKeyboardButton::callback("🏷 Жанры", "menu:genres"),
        ],
        vec![
            InlineKeyboardButton::callback("⭐ В избранное", "menu:favorite"),
            InlineKeyboardButton::callback("📜 Избранное", "menu:favorites"),
        ],
        vec![InlineKeyboardButton::callback("❓ Помощь", "menu:help")],
    ]);
    bot.send_message(chat, text).reply_markup(kb).await?;
    Ok(())
}

async fn send_movie_list(
    bot: &Bot,
    chat: ChatId,
    header: &str,
    movies: &[Movie],
) -> anyhow::Result<()> {
    let blocks: Vec<String> = movies.iter().map(|m| make_block(m, 400)).collect();
    let text = format!("<b>{}</b>\n\n{}", html_escape(header), join_blocks(blocks, 3500));
    for part in split_by_chars(&text, 4000) {
        bot.send_message(chat, part).parse_mode(ParseMode::Html).await?;
    }
    bot.send_message(chat, "Выбери фильм, чтобы посмотреть детали:")
        .reply_markup(keyboard_movies(movies, "detail", "🎬"))
        .await?;
    Ok(())
}

async fn send_trending(bot: &Bot, chat: ChatId, deps: &Deps) -> anyhow::Result<()> {
    match deps.tmdb.trending(10).await {
        Ok(movies) if movies.is_empty() => {
            bot.send_message(chat, "Не получилось собрать популярное, попробуй позже.")
                .await?;
        }
        Ok(movies) => send_movie_list(bot, chat, "Популярное сегодня:", &movies).await?,
        Err(e) => {
            warn!("trending fetch failed: {e}");
            bot.send_message(chat, TMDB_DOWN).await?;
        }
    }
    Ok(())
}

async fn send_favorites(bot: &Bot, chat: ChatId, user_id: i64, deps: &Deps) -> anyhow::Result<()> {
    match deps.storage.favorites(user_id).await {
        Ok(list) if list.is_empty() => {
            bot.send_message(
                chat,
                "Избранное пусто. Добавь фильм командой /favorite название.",
            )
            .await?;
        }
        Ok(list) => {
            let lines: Vec<String> = list.iter().map(|t| format!("• {}", html_escape(t))).collect();
            bot.send_message(chat, format!("<b>⭐ Твоё избранное:</b>\n{}", lines.join("\n")))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            warn!("favorites read failed for user {user_id}: {e}");
            bot.send_message(chat, "Не получилось прочитать избранное, попробуй позже.")
                .await?;
        }
    }
    Ok(())
}

async fn send_genre_menu(bot: &Bot, chat: ChatId, deps: &Deps) -> anyhow::Result<()> {
    match deps.tmdb.genres().await {
        Ok(genres) => {
            let mut rows: Vec<Vec<InlineKeyboardButton>> = genres
                .iter()
                .take(10)
                .map(|g| {
                    vec![InlineKeyboardButton::callback(
                        g.name.clone(),
                        format!("genre:{}", g.id),
                    )]
                })
                .collect();
            rows.push(vec![menu_button()]);
            bot.send_message(chat, "🏷 Выбери жанр:")
                .reply_markup(InlineKeyboardMarkup::new(rows))
                .await?;
        }
        Err(e) => {
            warn!("genre list fetch failed: {e}");
            bot.send_message(chat, TMDB_DOWN).await?;
        }
    }
    Ok(())
}

async fn send_movie_details(
    bot: &Bot,
    q: &CallbackQuery,
    chat: ChatId,
    id: u64,
    deps: &Deps,
) -> anyhow::Result<()> {
    match deps.tmdb.movie_details(id).await {
        Ok(Some(m)) => {
            let mut text = make_block(&m, 2000);
            match deps.tmdb.movie_credits(id, 5).await {
                Ok(cast) if !cast.is_empty() => {
                    text.push_str(&format!("\n\n👥 В ролях: {}", html_escape(&cast.join(", "))));
                }
                Ok(_) => {}
                Err(e) => warn!("credits fetch failed for movie {id}: {e}"),
            }
            bot.send_message(chat, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard_details(&m))
                .await?;
            if let Some(p) = &m.poster_path {
                let url = format!("https://image.tmdb.org/t/p/w500{p}");
                if let Ok(bytes) = fetch_image(&url).await {
                    bot.send_photo(
                        chat,
                        InputFile::memory(bytes).file_name(format!("poster_{id}.jpg")),
                    )
                    .await?;
                }
            }
            answer_cb(bot, q, "Показал").await?;
        }
        Ok(None) => answer_cb(bot, q, "Не удалось получить данные").await?,
        Err(e) => {
            warn!("details fetch failed for movie {id}: {e}");
            answer_cb(bot, q, "TMDb недоступен, попробуй позже").await?;
        }
    }
    Ok(())
}

async fn save_favorite(
    bot: &Bot,
    q: &CallbackQuery,
    _chat: ChatId,
    id: u64,
    deps: &Deps,
) -> anyhow::Result<()> {
    let user_id = cb_user_id(q);
    let title = match deps.tmdb.movie_details(id).await {
        Ok(Some(m)) => one_line_title(&m),
        Ok(None) => {
            answer_cb(bot, q, "Не удалось получить данные о фильме").await?;
            return Ok(());
        }
        Err(e) => {
            warn!("details fetch failed for movie {id}: {e}");
            answer_cb(bot, q, "TMDb недоступен, попробуй позже").await?;
            return Ok(());
        }
    };
    match deps
        .storage
        .add_favorite(user_id, i64::try_from(id).unwrap_or(0), &title)
        .await
    {
        Ok(true) => answer_cb(bot, q, &format!("«{title}» в избранном")).await?,
        Ok(false) => answer_cb(bot, q, "Уже в избранном").await?,
        Err(e) => {
            warn!("favorite write failed for user {user_id}: {e}");
            answer_cb(bot, q, "Не получилось сохранить, попробуй позже").await?;
        }
    }
    Ok(())
}

/* ====== Кнопки ====== */

fn keyboard_movies(movies: &[Movie], action: &str, icon: &str) -> InlineKeyboardMarkup {
    // по одной в строке
    let mut rows: Vec<Vec<InlineKeyboardButton>> = movies
        .iter()
        .map(|m| {
            vec![InlineKeyboardButton::callback(
                format!("{icon} {}", one_line_title(m)),
                format!("{action}:{}", m.id),
            )]
        })
        .collect();
    rows.push(vec![menu_button()]);
    InlineKeyboardMarkup::new(rows)
}

fn keyboard_details(m: &Movie) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "⭐ В избранное",
            format!("save:{}", m.id),
        )],
        vec![menu_button()],
    ])
}

fn menu_button() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("🏛 Главное меню", "menu:menu")
}

/* ====== Вспомогательные ====== */

fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(0)
}

fn cb_user_id(q: &CallbackQuery) -> i64 {
    i64::try_from(q.from.id.0).unwrap_or(0)
}

fn parse_callback(data: &str) -> (&str, &str) {
    let mut parts = data.splitn(2, ':');
    (parts.next().unwrap_or(""), parts.next().unwrap_or(""))
}

fn one_line_title(m: &Movie) -> String {
    match m.year() {
        Some(y) => format!("{} ({})", m.title, y),
        None => m.title.clone(),
    }
}

fn make_block(m: &Movie, overview_limit: usize) -> String {
    let mut head = format!("<b>{}</b>", html_escape(&m.title));
    if let Some(y) = m.year() {
        head.push_str(&format!(" ({y})"));
    }
    if let Some(r) = m.vote_average.filter(|r| *r > 0.0) {
        head.push_str(&format!(" · ⭐ {r:.1}"));
    }
    let body = match m.overview.as_deref().map(str::trim) {
        Some(o) if !o.is_empty() => clip(&html_escape(o), overview_limit),
        _ => "<i>нет описания</i>".to_string(),
    };
    format!("{head}\n\n{body}")
}

fn join_blocks(blocks: Vec<String>, limit_hint: usize) -> String {
    // аккуратно собираем, не превышая limit_hint; хвост порежет split_by_chars
    let mut out = String::new();
    for b in blocks {
        let piece = if out.is_empty() { b } else { format!("\n\n{}", b) };
        out.push_str(&piece);
        if out.chars().count() > limit_hint {
            break;
        }
    }
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Обрезает по графемам, не по char: эмодзи и диакритика не рвутся.
fn clip(s: &str, max: usize) -> String {
    let mut it = s.graphemes(true);
    let head: String = it.by_ref().take(max).collect();
    if it.next().is_some() {
        head + "…"
    } else {
        head
    }
}

fn split_by_chars(s: &str, max: usize) -> Vec<String> {
    if s.chars().count() <= max {
        return vec![s.to_string()];
    }
    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in s.chars() {
        if cur.chars().count() >= max {
            out.push(cur);
            cur = String::new();
        }
        cur.push(ch);
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

async fn answer_cb(bot: &Bot, q: &CallbackQuery, text: &str) -> anyhow::Result<()> {
    bot.answer_callback_query(q.id.clone())
        .text(text)
        .show_alert(false)
        .await?;
    Ok(())
}

async fn ack_cb(bot: &Bot, q: &CallbackQuery) -> anyhow::Result<()> {
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

fn message_text_any(msg: &Message) -> Option<String> {
    if let Some(t) = msg.text() {
        return Some(t.to_string());
    }
    if let Some(c) = msg.caption() {
        return Some(c.to_string());
    }
    None
}

/* ====== Загрузка постера байтами (устойчиво к редиректам/CDN) ====== */
async fn fetch_image(url: &str) -> anyhow::Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent("Mozilla/5.0 (compatible; tg-bot/1.0)")
        .build()?;
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, "image/*")
        .send()
        .await?;
    if !resp.status().is_success() {
        anyhow::bail!("status {}", resp.status());
    }
    if let Some(ct) = resp.headers().get(reqwest::header::CONTENT_TYPE) {
        let ct = ct.to_str().unwrap_or("");
        if !ct.starts_with("image/") {
            anyhow::bail!("unexpected content-type: {ct}");
        }
    }
    Ok(resp.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, date: Option<&str>, rating: Option<f64>, overview: Option<&str>) -> Movie {
        Movie {
            id: 1,
            title: title.to_string(),
            overview: overview.map(str::to_string),
            poster_path: None,
            release_date: date.map(str::to_string),
            vote_average: rating,
        }
    }

    #[test]
    fn one_line_title_with_and_without_year() {
        assert_eq!(
            one_line_title(&movie("Начало", Some("2010-07-16"), None, None)),
            "Начало (2010)"
        );
        assert_eq!(one_line_title(&movie("Начало", None, None, None)), "Начало");
    }

    #[test]
    fn make_block_escapes_and_shows_year_and_rating() {
        let b = make_block(
            &movie("Кин<о>", Some("2010-07-16"), Some(8.4), Some("сны <во> снах")),
            400,
        );
        assert!(b.contains("<b>Кин&lt;о&gt;</b>"));
        assert!(b.contains("(2010)"));
        assert!(b.contains("⭐ 8.4"));
        assert!(b.contains("сны &lt;во&gt; снах"));
    }

    #[test]
    fn make_block_without_overview_has_placeholder() {
        let b = make_block(&movie("Начало", Some("2010-07-16"), None, Some("   ")), 400);
        assert!(b.contains("нет описания"));
    }

    #[test]
    fn clip_counts_graphemes_not_chars() {
        assert_eq!(clip("привет", 4), "прив…");
        assert_eq!(clip("кино", 10), "кино");
        // 'é' из двух code point'ов — одна графема
        assert_eq!(clip("e\u{301}xyz", 2), "e\u{301}x…");
    }

    #[test]
    fn split_respects_limit() {
        let s = "абвгдежзик";
        let parts = split_by_chars(s, 4);
        assert_eq!(parts, vec!["абвг", "дежз", "ик"]);
        assert_eq!(split_by_chars("абв", 4), vec!["абв"]);
    }

    #[test]
    fn join_blocks_stops_after_limit() {
        let blocks = vec!["a".repeat(10), "b".repeat(10), "c".repeat(10)];
        let joined = join_blocks(blocks, 15);
        assert!(joined.contains('a'));
        assert!(joined.contains('b'));
        assert!(!joined.contains('c'));
    }

    #[test]
    fn callback_data_splits_on_first_colon() {
        assert_eq!(parse_callback("detail:42"), ("detail", "42"));
        assert_eq!(parse_callback("menu:menu"), ("menu", "menu"));
        assert_eq!(parse_callback("oddball"), ("oddball", ""));
    }

    #[tokio::test]
    async fn chat_state_take_resets_pending() {
        let state = ChatState::new();
        let chat = ChatId(7);
        state.set(chat, Pending::Actor).await;
        assert_eq!(state.take(chat).await, Some(Pending::Actor));
        assert_eq!(state.take(chat).await, None);
    }
}
