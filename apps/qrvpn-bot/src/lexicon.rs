//! User-facing texts (Russian). Captions use HTML parse mode.

use chrono::{DateTime, FixedOffset, Utc};

/// Expiration dates are shown to users as `dd.mm.yyyy` in the bot's local
/// time zone, so a window ending late in the UTC evening shows the next day
/// in Moscow.
pub fn display_date(date: DateTime<Utc>, offset: FixedOffset) -> String {
    date.with_timezone(&offset).format("%d.%m.%Y").to_string()
}

pub const MENU: &str = "👋 Добро пожаловать!\n\n\
    Здесь можно оформить подписку на VPN, получить пробный период \
    и QR-код для подключения.\n\nВоспользуйтесь меню ниже ⤵️";

pub const CHOOSE_PLAN: &str = "Выберите тариф! ⤵️";

pub const EMPTY_QR: &str = "😔 К сожалению, QR-код для подключения сейчас недоступен.\n\
    Оплата зачислена, напишите в поддержку и мы выдадим код вручную ⤵️";

pub const FULFILLMENT_FAILED: &str = "❌ Оплата прошла, но при оформлении подписки произошла ошибка.\n\
    Пожалуйста, обратитесь в поддержку ⤵️";

pub const POOL_EXHAUSTED: &str = "😔 Свободные QR-коды временно закончились.\n\
    Мы уже получили уведомление и скоро всё исправим. Поддержка ⤵️";

pub const UNKNOWN_PLAN: &str = "❌ Не удалось определить тариф оплаты. Обратитесь в поддержку ⤵️";

pub const TRIAL_ALREADY_USED: &str = "ℹ️ Пробный период уже был использован.\n\
    Чтобы продолжить пользоваться VPN, оформите подписку 💳";

pub const TRIAL_HAS_SUBSCRIPTION: &str = "ℹ️ У вас уже есть активная подписка, пробный период не нужен 🙂";

pub const SUPPORT: &str = "🆘 Возникли вопросы? Напишите нам, мы поможем ⤵️";

pub const SETTINGS: &str = "⚙️ <b>Настройки подключения</b>\n\n\
    1. Установите приложение WireGuard на своё устройство.\n\
    2. Добавьте туннель, отсканировав QR-код.\n\
    3. Включите туннель.\n\n\
    Выберите устройство для подробной инструкции ⤵️";

pub const SETUP_IOS: &str = "📱 <b>iPhone / iPad</b>\n\n\
    Установите WireGuard из App Store: https://apps.apple.com/app/wireguard/id1441195209\n\
    Нажмите «+» → «Создать из QR-кода» и наведите камеру на QR-код.";

pub const SETUP_ANDROID: &str = "🤖 <b>Android</b>\n\n\
    Установите WireGuard из Google Play: https://play.google.com/store/apps/details?id=com.wireguard.android\n\
    Нажмите «+» → «Сканировать QR-код».";

pub const SETUP_DESKTOP: &str = "💻 <b>Windows / macOS</b>\n\n\
    Скачайте WireGuard: https://www.wireguard.com/install/\n\
    Сохраните QR-код, откройте его на телефоне или попросите в поддержке файл конфигурации.";

pub const NO_QR_YET: &str = "ℹ️ QR-код ещё не выдан. Он придёт сразу после оплаты или активации пробного периода.";

pub const NO_SUBSCRIPTION: &str = "👤 <b>Профиль</b>\n\nАктивной подписки нет.";

pub const BOT_STARTED: &str = "Бот запущен! Вы администратор!";

pub fn first_subscription_caption(end_date: &str) -> String {
    format!(
        "✅  Оплата прошла успешно!!! \n\n\n\
         Ваш QR - код для подключения ⤴️ \n\n\
         <b>Срок действия:</b> до {end_date}\n\n\
         Перейдите в меню настроек для подключения"
    )
}

pub fn renewal_new_image_caption(end_date: &str) -> String {
    format!(
        "✅  Оплата прошла успешно!!! \n\
         🤝 Ваш QR - код для подключения ⤴️ \n\n\
         Срок действия подписки: до {end_date}\n\n\
         Меню настроек для подключения ⤵️ "
    )
}

pub fn renewal_cached_caption(end_date: &str) -> String {
    format!(
        "✅  Оплата прошла успешно!!! \n\
         Спасибо что Вы снова с нами! 🤝\n\
         Ваш QR - код для подключения ⤴️ \n\n\
         Общий срок действия подписки: до {end_date}\n\n\
         Меню настроек для подключения ⤵️ "
    )
}

pub fn renewal_text(end_date: &str) -> String {
    format!(
        "✅  Оплата прошла успешно!!! \n\
         Спасибо что Вы снова с нами! 🤝\n\n\n\
         Общий срок действия подписки: до {end_date}\n\n"
    )
}

pub fn trial_caption(end_date: &str) -> String {
    format!(
        "✅  Подписка успешно оформлена!!! \n\n\n\
         Ваш QR - код для подключения ⤴️ \n\n\
         <b>Срок действия пробного периода:</b> до {end_date}\n\n\
         Перейдите в меню настроек для подключения"
    )
}

pub fn qr_caption(pk: &str) -> String {
    format!("🔳 Ваш QR - код для подключения ⤴️\nКлиент: <code>Client_№{pk}</code>")
}

pub fn profile(end_date: &str, client_id: Option<&str>) -> String {
    let mut text = format!("👤 <b>Профиль</b>\n\nПодписка активна до <b>{end_date}</b>");
    if let Some(client_id) = client_id {
        text.push_str(&format!("\nКлиент: <code>{client_id}</code>"));
    }
    text
}

pub fn invoice_description(title: &str, days: i64) -> String {
    format!("Доступ к VPN на {days} дн. ({title}). После оплаты бот пришлёт QR-код для подключения.")
}

pub fn expiring_reminder(end_date: &str) -> String {
    format!(
        "⏳ Ваша подписка заканчивается {end_date}.\n\
         Продлите её заранее, чтобы VPN работал без перерыва 💳"
    )
}

pub const EXPIRED_NOTICE: &str = "⌛️ Срок действия подписки истёк.\n\
    Оформите новую подписку, чтобы снова пользоваться VPN 💳";

pub fn admin_report(users: i64, active: i64, trials: i64, pool_left: usize) -> String {
    format!(
        "📊 <b>Ежедневный отчёт</b>\n\n\
         Пользователей: {users}\n\
         Активных подписок: {active}\n\
         Пробных периодов: {trials}\n\
         QR-кодов в запасе: {pool_left}"
    )
}

pub fn pool_low_alert(pool_left: usize) -> String {
    format!("⚠️ В пуле осталось всего {pool_left} QR-кодов. Пора загрузить новые.")
}

pub fn pool_exhausted_payment_alert(user_id: i64) -> String {
    format!("🚨 Пул QR-кодов пуст! Пользователь {user_id} оплатил подписку, но не получил код.")
}

pub fn pool_exhausted_trial_alert(user_id: i64) -> String {
    format!("🚨 Пул QR-кодов пуст! Пользователь {user_id} запросил пробный период, но не получил код.")
}
