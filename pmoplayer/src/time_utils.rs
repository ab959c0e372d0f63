//! Formatage des positions de lecture.

/// Formate une durée en secondes au format `MM:SS`.
///
/// Les minutes ne sont pas bornées à 59 : une piste de 75 minutes s'affiche
/// `75:00`. Une valeur non finie ou négative donne `00:00`.
///
/// # Examples
/// ```
/// # use pmoplayer::format_clock;
/// assert_eq!(format_clock(0.0), "00:00");
/// assert_eq!(format_clock(65.9), "01:05");
/// assert_eq!(format_clock(f64::NAN), "00:00");
/// ```
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
