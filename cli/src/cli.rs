use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// 向微信公众号、小程序、企业微信、Slack、飞书推送消息
#[derive(Parser, Debug)]
#[command(name = "mpush", version)]
pub struct Cli {
    /// http user agent
    #[arg(short = 'a', long = "user_agent", global = true, value_name = "UA")]
    pub user_agent: Option<String>,

    /// http request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// weixin official account and mini program
    #[command(visible_alias = "wx")]
    Weixin {
        #[command(subcommand)]
        command: WeixinCommand,
    },
    /// work weixin
    #[command(name = "workweixin", visible_alias = "wxwork")]
    WorkWeixin {
        #[command(subcommand)]
        command: WorkCommand,
    },
    /// slack
    #[command(visible_alias = "sk")]
    Slack {
        #[command(subcommand)]
        command: SlackCommand,
    },
    /// fei shu
    #[command(visible_alias = "fs")]
    Feishu {
        #[command(subcommand)]
        command: FeishuCommand,
    },
}

// --- weixin ---

#[derive(Args, Debug, Clone, Default)]
pub struct WeixinAuthArgs {
    /// weixin access token
    #[arg(short = 't', long = "access_token", env = "MPUSH_WEIXIN_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// weixin app id
    #[arg(short = 'i', long = "app_id", env = "MPUSH_WEIXIN_APP_ID")]
    pub app_id: Option<String>,

    /// weixin app secret
    #[arg(short = 's', long = "app_secret", env = "MPUSH_WEIXIN_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum WeixinCommand {
    /// get weixin access token
    Token(WeixinTokenArgs),
    /// weixin official account
    #[command(name = "offiaccount", visible_alias = "mp")]
    OffiAccount {
        #[command(subcommand)]
        command: OffiAccountCommand,
    },
    /// weixin mini program
    #[command(name = "miniprogram", visible_alias = "mini")]
    MiniProgram {
        #[command(subcommand)]
        command: MiniProgramCommand,
    },
    /// weixin temporary media
    Media {
        #[command(subcommand)]
        command: MediaCommand,
    },
}

#[derive(Args, Debug)]
pub struct WeixinTokenArgs {
    /// weixin app id (required)
    #[arg(short = 'i', long = "app_id", env = "MPUSH_WEIXIN_APP_ID")]
    pub app_id: String,

    /// weixin app secret (required)
    #[arg(short = 's', long = "app_secret", env = "MPUSH_WEIXIN_APP_SECRET", hide_env_values = true)]
    pub app_secret: String,
}

#[derive(Subcommand, Debug)]
pub enum OffiAccountCommand {
    /// publish weixin official account customer message
    Customer(OffiAccountCustomerArgs),
    /// weixin official account template message
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },
}

#[derive(Args, Debug)]
pub struct OffiAccountCustomerArgs {
    #[command(flatten)]
    pub auth: WeixinAuthArgs,

    /// weixin user open id (required)
    #[arg(short = 'o', long = "to_user")]
    pub to_user: String,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type")]
    pub msg_type: String,

    /// customer service account
    #[arg(long = "kf_account")]
    pub kf_account: Option<String>,

    pub data: String,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// publish weixin official account template message
    Send(TemplateSendArgs),
    /// publish weixin official account one-time subscribe template message
    #[command(visible_alias = "sub")]
    Subscribe(TemplateSubscribeArgs),
}

#[derive(Args, Debug)]
pub struct TemplateSendArgs {
    #[command(flatten)]
    pub auth: WeixinAuthArgs,

    /// weixin user open id (required)
    #[arg(short = 'o', long = "to_user")]
    pub to_user: String,

    /// template id (required)
    #[arg(short = 'p', long = "template_id")]
    pub template_id: String,

    /// url
    #[arg(long)]
    pub url: Option<String>,

    /// mini program, e.g. app_id=XiaoChengXuAppId,page_path=index?foo=bar
    #[arg(long)]
    pub mini: Option<String>,

    /// client message id
    #[arg(long = "client_msg_id")]
    pub client_msg_id: Option<String>,

    /// template content color
    #[arg(long)]
    pub color: Option<String>,

    pub data: String,
}

#[derive(Args, Debug)]
pub struct TemplateSubscribeArgs {
    #[command(flatten)]
    pub auth: WeixinAuthArgs,

    /// weixin user open id (required)
    #[arg(short = 'o', long = "to_user")]
    pub to_user: String,

    /// template id (required)
    #[arg(short = 'p', long = "template_id")]
    pub template_id: String,

    /// subscribe scene (required)
    #[arg(long)]
    pub scene: String,

    /// message title, up to 15 characters (required)
    #[arg(long)]
    pub title: String,

    /// url
    #[arg(long)]
    pub url: Option<String>,

    /// mini program, e.g. app_id=XiaoChengXuAppId,page_path=index?foo=bar
    #[arg(long)]
    pub mini: Option<String>,

    pub data: String,
}

#[derive(Subcommand, Debug)]
pub enum MiniProgramCommand {
    /// publish weixin mini program customer message
    Customer(MiniProgramCustomerArgs),
    /// publish weixin mini program subscribe message
    Subscribe(MiniProgramSubscribeArgs),
}

#[derive(Args, Debug)]
pub struct MiniProgramCustomerArgs {
    #[command(flatten)]
    pub auth: WeixinAuthArgs,

    /// weixin user open id (required)
    #[arg(short = 'o', long = "to_user")]
    pub to_user: String,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type")]
    pub msg_type: String,

    pub data: String,
}

#[derive(Args, Debug)]
pub struct MiniProgramSubscribeArgs {
    #[command(flatten)]
    pub auth: WeixinAuthArgs,

    /// weixin user open id (required)
    #[arg(short = 'o', long = "to_user")]
    pub to_user: String,

    /// template id (required)
    #[arg(short = 'p', long = "template_id")]
    pub template_id: String,

    /// mini program page
    #[arg(long)]
    pub page: Option<String>,

    /// mini program state: developer, trial, formal
    #[arg(long = "miniprogram_state")]
    pub mini_program_state: Option<String>,

    /// language: zh_CN, en_US, zh_HK, zh_TW
    #[arg(long)]
    pub lang: Option<String>,

    pub data: String,
}

#[derive(Subcommand, Debug)]
pub enum MediaCommand {
    /// upload weixin temporary media
    Upload(MediaUploadArgs),
}

#[derive(Args, Debug)]
pub struct MediaUploadArgs {
    #[command(flatten)]
    pub auth: WeixinAuthArgs,

    /// media type: image, voice, video, thumb (required)
    #[arg(short = 'y', long = "media_type")]
    pub media_type: String,

    pub file: PathBuf,
}

// --- work weixin ---

#[derive(Args, Debug, Clone, Default)]
pub struct WorkAuthArgs {
    /// work weixin access token
    #[arg(short = 't', long = "access_token", env = "MPUSH_WORK_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// work weixin corp id
    #[arg(short = 'i', long = "corp_id", env = "MPUSH_WORK_CORP_ID")]
    pub corp_id: Option<String>,

    /// work weixin corp secret
    #[arg(short = 's', long = "corp_secret", env = "MPUSH_WORK_CORP_SECRET", hide_env_values = true)]
    pub corp_secret: Option<String>,
}

/// id 转译与重复消息检查
#[derive(Args, Debug, Clone)]
pub struct DeliveryArgs {
    /// enable id translated, 0 or 1
    #[arg(short = 'r', long = "enable_id_trans", default_value_t = 0)]
    pub enable_id_trans: i64,

    /// enable duplicate check, 0 or 1
    #[arg(short = 'c', long = "enable_duplicate_check", default_value_t = 0)]
    pub enable_duplicate_check: i64,

    /// duplicate check interval in seconds, up to 4 hours
    #[arg(short = 'd', long = "duplicate_check_interval", default_value_t = 1800)]
    pub duplicate_check_interval: i64,
}

#[derive(Subcommand, Debug)]
pub enum WorkCommand {
    /// get work weixin access token
    Token(WorkTokenArgs),
    /// publish work weixin app message
    App(AppArgs),
    /// publish work weixin app chat message
    #[command(name = "appchat", visible_alias = "chat")]
    AppChat(AppChatArgs),
    /// publish work weixin external contact message
    #[command(name = "externalcontact", visible_alias = "ec")]
    ExternalContact(ExternalContactArgs),
    /// publish work weixin customer service message
    #[command(visible_alias = "kf")]
    Customer(KfArgs),
    /// work weixin group bot
    Bot {
        #[command(subcommand)]
        command: BotCommand,
    },
}

#[derive(Args, Debug)]
pub struct WorkTokenArgs {
    /// work weixin corp id (required)
    #[arg(short = 'i', long = "corp_id", env = "MPUSH_WORK_CORP_ID")]
    pub corp_id: String,

    /// work weixin corp secret (required)
    #[arg(short = 's', long = "corp_secret", env = "MPUSH_WORK_CORP_SECRET", hide_env_values = true)]
    pub corp_secret: String,
}

#[derive(Args, Debug)]
#[command(subcommand_negates_reqs = true)]
pub struct AppArgs {
    #[command(subcommand)]
    pub command: Option<AppCommand>,

    #[command(flatten)]
    pub auth: WorkAuthArgs,

    /// work weixin agent id (required)
    #[arg(short = 'e', long = "agent_id", required = true)]
    pub agent_id: Option<i64>,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type", required = true)]
    pub msg_type: Option<String>,

    /// work weixin user id list
    #[arg(short = 'o', long = "to_user")]
    pub to_user: Option<String>,

    /// work weixin party id list
    #[arg(short = 'p', long = "to_party")]
    pub to_party: Option<String>,

    /// work weixin tag id list
    #[arg(short = 'g', long = "to_tag")]
    pub to_tag: Option<String>,

    /// safe, 0, 1 or 2 (mpnews only)
    #[arg(long, default_value_t = 0)]
    pub safe: i64,

    #[command(flatten)]
    pub delivery: DeliveryArgs,

    #[arg(required = true)]
    pub data: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// recall work weixin app message sent within 24 hours
    Undo {
        /// message id
        msg_id: String,
    },
}

#[derive(Args, Debug)]
pub struct AppChatArgs {
    #[command(flatten)]
    pub auth: WorkAuthArgs,

    /// app chat id (required)
    #[arg(short = 'c', long = "chat_id")]
    pub chat_id: String,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type")]
    pub msg_type: String,

    /// safe, 0 or 1
    #[arg(long, default_value_t = 0)]
    pub safe: i64,

    pub data: String,
}

#[derive(Args, Debug)]
pub struct ExternalContactArgs {
    #[command(flatten)]
    pub auth: WorkAuthArgs,

    /// work weixin agent id (required)
    #[arg(short = 'e', long = "agent_id")]
    pub agent_id: i64,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type")]
    pub msg_type: String,

    /// receive scope: 0 students and parents, 1 students, 2 parents
    #[arg(short = 'o', long = "recv_scope", default_value_t = 0)]
    pub recv_scope: i64,

    /// parent user id list
    #[arg(short = 'n', long = "to_parent_user_id")]
    pub to_parent_user_id: Option<String>,

    /// student user id list
    #[arg(short = 'u', long = "to_student_user_id")]
    pub to_student_user_id: Option<String>,

    /// party id list
    #[arg(short = 'p', long = "to_party")]
    pub to_party: Option<String>,

    /// send to all, 0 or 1
    #[arg(short = 'l', long = "to_all", default_value_t = 0)]
    pub to_all: i64,

    #[command(flatten)]
    pub delivery: DeliveryArgs,

    pub data: String,
}

#[derive(Args, Debug)]
pub struct KfArgs {
    #[command(flatten)]
    pub auth: WorkAuthArgs,

    /// customer external user id (required)
    #[arg(short = 'o', long = "to_user")]
    pub to_user: String,

    /// customer service account id (required)
    #[arg(short = 'k', long = "open_kf_id")]
    pub open_kf_id: String,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type")]
    pub msg_type: String,

    /// message id
    #[arg(long = "msg_id")]
    pub msg_id: Option<String>,

    pub data: String,
}

#[derive(Subcommand, Debug)]
pub enum BotCommand {
    /// publish work weixin group bot message
    Send(BotSendArgs),
    /// work weixin group bot file upload
    Upload(BotUploadArgs),
}

#[derive(Args, Debug)]
pub struct BotSendArgs {
    /// work weixin group bot key (required)
    #[arg(short = 'k', long = "key", env = "MPUSH_WORK_BOT_KEY", hide_env_values = true)]
    pub key: String,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type")]
    pub msg_type: String,

    /// mentioned user id list, @all for everyone
    #[arg(long = "at_user")]
    pub at_user: Option<String>,

    /// mentioned mobile list, @all for everyone
    #[arg(long = "at_mobile")]
    pub at_mobile: Option<String>,

    pub data: String,
}

#[derive(Args, Debug)]
pub struct BotUploadArgs {
    /// work weixin group bot key (required)
    #[arg(short = 'k', long = "key", env = "MPUSH_WORK_BOT_KEY", hide_env_values = true)]
    pub key: String,

    /// media type: file, voice
    #[arg(short = 'y', long = "media_type", default_value = "file")]
    pub media_type: String,

    pub file: PathBuf,
}

// --- slack / feishu ---

#[derive(Subcommand, Debug)]
pub enum SlackCommand {
    /// publish slack bot message
    Bot(SlackBotArgs),
}

#[derive(Args, Debug)]
pub struct SlackBotArgs {
    /// slack webhook url (required)
    #[arg(long, env = "MPUSH_SLACK_URL", hide_env_values = true)]
    pub url: String,

    pub data: String,
}

#[derive(Subcommand, Debug)]
pub enum FeishuCommand {
    /// publish fei shu bot message
    Bot(FeishuBotArgs),
}

#[derive(Args, Debug)]
pub struct FeishuBotArgs {
    /// fei shu bot access token (required)
    #[arg(short = 't', long = "access_token", env = "MPUSH_FEISHU_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// fei shu bot sign secret
    #[arg(short = 's', long = "secret", env = "MPUSH_FEISHU_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// message type (required)
    #[arg(short = 'm', long = "msg_type")]
    pub msg_type: String,

    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_tree() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases() {
        let cli = Cli::try_parse_from([
            "mpush", "wxwork", "ec", "-t", "T", "-e", "1", "-m", "text", "-n", "u1|u2", "hello",
        ])
        .unwrap();
        let Command::WorkWeixin {
            command: WorkCommand::ExternalContact(args),
        } = cli.command
        else {
            panic!("expected externalcontact");
        };
        assert_eq!(args.to_parent_user_id.as_deref(), Some("u1|u2"));
        assert_eq!(args.delivery.duplicate_check_interval, 1800);
        assert_eq!(args.data, "hello");
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "mpush", "sk", "bot", "--url", "https://hooks.slack.com/x", "-a", "mpush/1.0",
            "--timeout", "5", "{}",
        ])
        .unwrap();
        assert_eq!(cli.user_agent.as_deref(), Some("mpush/1.0"));
        assert_eq!(cli.timeout, Some(5));
    }

    #[test]
    fn test_app_undo() {
        let cli =
            Cli::try_parse_from(["mpush", "workweixin", "app", "-t", "T", "undo", "MSGID"]).unwrap();
        let Command::WorkWeixin {
            command: WorkCommand::App(args),
        } = cli.command
        else {
            panic!("expected app");
        };
        assert!(matches!(args.command, Some(AppCommand::Undo { ref msg_id }) if msg_id == "MSGID"));
    }

    #[test]
    fn test_app_requires_agent_id() {
        let err = Cli::try_parse_from(["mpush", "workweixin", "app", "-t", "T", "-m", "text", "hi"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
