//! Usage text for `-h` / `--help`

use crate::app::PROGRAM_NAME;

/// Full help text
pub fn usage_text() -> String {
    let p = PROGRAM_NAME;
    format!(
        "Usage:\n\
         \x20 {p} [options] [file ...]      Edit file(s)\n\
         \x20 {p} [options] -t <tag>        Edit file where tag is defined\n\
         \x20 {p} [options] -q [errorfile]  Edit file with first error\n\
         \n\
         Options:\n\
         \x20 --                    Only file names after this\n\
         \x20 +                     Start at end of file\n\
         \x20 +<lnum>               Start at line <lnum>\n\
         \x20 +/<pattern>           Start at first occurrence of <pattern>\n\
         \x20 --cmd <cmd>           Execute <cmd> before any config\n\
         \x20 -c <cmd>              Execute <cmd> after config and first file\n\
         \x20 -S [session]          Source <session> after loading the first file\n\
         \x20 -s <scriptin>         Read Normal mode commands from <scriptin>\n\
         \x20 -w <scriptout>        Append all typed characters to <scriptout>\n\
         \x20 -W <scriptout>        Write all typed characters to <scriptout>\n\
         \x20 -u <config>           Use this config file (NONE or NORC to skip)\n\
         \x20 -i <shada>            Use this state file (NONE to disable)\n\
         \x20 -                     Read text from stdin\n\
         \x20 -e, -E                Ex mode / Improved Ex mode\n\
         \x20 -s                    Silent (batch) mode, only with -e or -E\n\
         \x20 -b                    Binary mode\n\
         \x20 -d                    Diff mode\n\
         \x20 -l                    Lisp mode\n\
         \x20 -m, -M                Modifications not allowed to be written / at all\n\
         \x20 -n                    No swap file, use memory only\n\
         \x20 -o[N]                 Open N windows (default: one per file)\n\
         \x20 -O[N]                 Like -o but split vertically\n\
         \x20 -p[N]                 Open N tab pages (default: one per file)\n\
         \x20 -r, -L                Recover crashed file\n\
         \x20 -R                    Read-only mode\n\
         \x20 -Z                    Restricted mode\n\
         \x20 -A, -F, -H            Arabic, Farsi or Hebrew mode\n\
         \x20 -D                    Debugging mode\n\
         \x20 -T <terminal>         Set terminal type\n\
         \x20 -V[N][file]           Verbose [level N] [log messages to file]\n\
         \x20 -w<N>                 Set window height\n\
         \x20 --startuptime <file>  Write startup timing messages to <file>\n\
         \x20 --noplugin            Don't load plugins\n\
         \x20 --literal             Don't expand wildcards\n\
         \x20 --headless            Don't start a user interface\n\
         \x20 --embed               Like --headless, for use by another program\n\
         \x20 --api-info            Write capability manifest to stdout\n\
         \x20 --version, -v         Print version information\n\
         \x20 --help, -h            Print this help message\n"
    )
}

/// Second line of every argument error
pub fn usage_hint() -> String {
    format!("More info with \"{PROGRAM_NAME} -h\"")
}
