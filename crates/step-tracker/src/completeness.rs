//! Required-field completeness of the active step.

use field_locator::ScanScope;
use formpilot_core_types::ElementHandle;
use page_model::{ElementInfo, PageQuery, PageResult};

/// Required eligible controls of the active section that hold no value.
pub async fn missing_required<P: PageQuery + ?Sized>(
    page: &P,
    scope: &ScanScope,
) -> PageResult<Vec<ElementHandle>> {
    let mut missing = Vec::new();
    for handle in scope.active_members() {
        let info = page.describe(*handle).await?;
        if info.required && !is_satisfied(page, *handle, &info).await? {
            missing.push(*handle);
        }
    }
    Ok(missing)
}

async fn is_satisfied<P: PageQuery + ?Sized>(
    page: &P,
    handle: ElementHandle,
    info: &ElementInfo,
) -> PageResult<bool> {
    if info.is_checkbox() {
        return page.is_checked(handle).await;
    }
    if info.is_radio() {
        let Some(name) = info.name.as_deref().filter(|n| !n.is_empty()) else {
            return page.is_checked(handle).await;
        };
        for other in page.input_like_elements(None).await? {
            let other_info = page.describe(other).await?;
            if other_info.is_radio()
                && other_info.name.as_deref() == Some(name)
                && page.is_checked(other).await?
            {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    if info.is_file() {
        return Ok(page.file_count(handle).await? > 0);
    }
    Ok(!page.read_value(handle).await?.trim().is_empty())
}

/// Short label for a control in reports: name, id, else the handle.
pub async fn describe_control<P: PageQuery + ?Sized>(
    page: &P,
    handle: ElementHandle,
) -> PageResult<String> {
    let info = page.describe(handle).await?;
    Ok(info
        .name
        .filter(|n| !n.is_empty())
        .or(info.id.filter(|i| !i.is_empty()))
        .unwrap_or_else(|| handle.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_model::{MemoryPage, PageInput};
    use platform_registry::StepMarkers;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn only_active_required_fields_count() {
        let page = MemoryPage::new(
            "https://apply.example.com",
            r#"<form>
                 <div class="step active">
                   <input id="name" name="name" required>
                   <input id="nick" name="nick">
                   <input type="radio" name="auth" value="yes" aria-required="true">
                   <input type="radio" name="auth" value="no">
                   <input type="checkbox" name="terms" required>
                 </div>
                 <div class="step"><input id="later" name="later" required></div>
               </form>"#,
        )
        .unwrap();
        let scope = ScanScope::discover(&page, None, &StepMarkers::default())
            .await
            .unwrap();

        let missing = missing_required(&page, &scope).await.unwrap();
        let mut names = Vec::new();
        for handle in &missing {
            names.push(describe_control(&page, *handle).await.unwrap());
        }
        assert_eq!(names, vec!["name", "auth", "terms"]);

        page.set_value_native(page.find("#name").unwrap().unwrap(), "Ada")
            .await
            .unwrap();
        page.activate(page.find("input[value=\"no\"]").unwrap().unwrap())
            .await
            .unwrap();
        page.activate(page.find("input[name=\"terms\"]").unwrap().unwrap())
            .await
            .unwrap();
        assert!(missing_required(&page, &scope).await.unwrap().is_empty());
    }
}
