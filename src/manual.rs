//! Manual pages printed by `man`.

static PAGES: &[(&str, &str)] = &[
    (
        "mkdir",
        "Usage: mkdir DIR [DIR ...]

Creates every DIR given, in order. A DIR may be relative to the working
directory or an absolute path; its parent must already exist.

A failure for one DIR does not stop the others. All failures are reported
together once the batch is done.

Names must be non-empty and cannot contain control characters or any of
/ ! @ $ & * ( ) ? : [ ] \" < > ' ` | = { } \\ , ;",
    ),
    (
        "cd",
        "Usage: cd DIR

Makes DIR the working directory. DIR may be relative or absolute.

  cd ..   enters the parent directory
  cd .    stays in the working directory
  cd /    enters the root directory",
    ),
    (
        "ls",
        "Usage: ls [-R] [PATH ...]

Without PATH, prints the names of the entries in the working directory.

For each PATH:
  a file prints its name
  a directory prints its name, a colon, then its entries indented

With -R every subdirectory is listed as well, parents before children.",
    ),
    (
        "pwd",
        "Usage: pwd

Prints the absolute path of the working directory.",
    ),
    (
        "curl",
        "Usage: curl URL

Downloads the text at URL and stores it in the working directory, in a file
named after the last segment of URL. An existing file of that name is
overwritten.",
    ),
    (
        "!",
        "Usage: !NUMBER

Runs entry NUMBER of the command history again. Entries are numbered from 1,
as printed by history.",
    ),
    (
        "mv",
        "Usage: mv OLDPATH NEWPATH

Moves the file or directory at OLDPATH. If NEWPATH is an existing directory
the entry is moved inside it. Otherwise the entry is moved to NEWPATH,
renaming it on the way. Nothing remains at OLDPATH afterwards.

A directory cannot be moved into itself.",
    ),
    (
        "cp",
        "Usage: cp OLDPATH NEWPATH

Copies the file or directory at OLDPATH into the directory NEWPATH.
Directories are copied with everything below them. OLDPATH is left as it
was, and later changes to either side do not affect the other.",
    ),
    (
        "cat",
        "Usage: cat FILE [FILE ...]

Prints the contents of each FILE. Consecutive files are separated by two
blank lines.",
    ),
    (
        "pushd",
        "Usage: pushd DIR

Saves the working directory on top of the directory stack, then makes DIR
the working directory. Use popd to come back.",
    ),
    (
        "popd",
        "Usage: popd

Removes the directory on top of the directory stack and makes it the working
directory. Fails when the stack is empty.",
    ),
    (
        "dirs",
        "Usage: dirs

Prints the directory stack, most recently pushed first.",
    ),
    (
        "grep",
        "Usage: grep [-R] REGEX PATH [PATH ...]

Prints the lines of each file at PATH that match REGEX in full. With more
than one file every line is prefixed by the path of its file.

With -R a PATH may also be a directory, in which case every file below it is
searched.",
    ),
    (
        "history",
        "Usage: history [NUMBER]

Prints the commands entered so far with their history numbers. With NUMBER
only the latest NUMBER commands are printed.",
    ),
    (
        "echo",
        "Usage: echo \"STRING\" [> OUTFILE | >> OUTFILE]

Prints STRING. With > OUTFILE the text replaces the contents of OUTFILE; with
>> OUTFILE it is added as a new line at the end. OUTFILE is created when it
does not exist.

Any command can redirect its output the same way.",
    ),
    (
        "man",
        "Usage: man CMD

Prints the manual page of CMD. man !NUMBER prints the page of the command at
that history entry.

Commands: mkdir cd ls pwd curl ! mv cp cat pushd popd dirs grep history
echo man rm exit",
    ),
    (
        "rm",
        "Usage: rm [-r] PATH

Removes the file at PATH. A directory is only removed with -r, together with
everything below it.",
    ),
    (
        "exit",
        "Usage: exit

Ends the session.",
    ),
];

/// The manual page for `command`, if one exists.
pub fn page(command: &str) -> Option<&'static str> {
    PAGES
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, page)| *page)
}
